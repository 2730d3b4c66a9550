use crate::{
    route::AUTH_CALLBACK_PATH, types::ChallengeState, ACCESS_TOKEN_COOKIE,
    COOKIE_AUTH_CHALLENGE_STATE,
};
use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    HttpRequest, HttpResponseBuilder,
};
use aes_gcm::{
    aead::{Aead, OsRng},
    AeadCore, Aes256Gcm, Key, KeyInit, Nonce,
};
use hex::FromHexError;
use std::{borrow::Cow, fmt, string::FromUtf8Error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("No challenge cookie found, start the login again.")]
    Missing,
    #[error("key length must be 32 char long")]
    AesKey,
    #[error("Challenge cookie is too short to be valid.")]
    Truncated,
    #[error("{0}")]
    AesGcm(String),
    #[error("{0}")]
    HexDecode(#[from] FromHexError),
    #[error("{0}")]
    FromUtf8Error(#[from] FromUtf8Error),
    #[error("Failed to json parse challenge: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<aes_gcm::aead::Error> for ChallengeError {
    fn from(value: aes_gcm::aead::Error) -> Self {
        ChallengeError::AesGcm(value.to_string())
    }
}

/// Attributes of the `access_token` cookie set after a successful callback.
#[derive(Clone, Debug, PartialEq)]
pub struct CookieSettings {
    /// Host-only cookie when `None`.
    pub domain: Option<String>,
    pub secure: bool,
    pub lifetime_seconds: i64,
}

pub(crate) enum CookiePath {
    All,
    Callback,
}

impl CookiePath {
    const ALL_PATH: &'static str = "/";
}

impl<'c> From<&CookiePath> for Cow<'c, str> {
    fn from(val: &CookiePath) -> Self {
        match val {
            CookiePath::All => Cow::Borrowed(CookiePath::ALL_PATH),
            CookiePath::Callback => Cow::Borrowed(AUTH_CALLBACK_PATH),
        }
    }
}

pub(crate) struct CookieHelper {}

impl CookieHelper {
    pub(crate) fn access_token_cookie(
        settings: &CookieSettings,
        access_token: &str,
    ) -> Cookie<'static> {
        let mut cookie = Cookie::build(ACCESS_TOKEN_COOKIE, access_token.to_owned())
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(settings.secure)
            .max_age(Duration::seconds(settings.lifetime_seconds))
            .path(&CookiePath::All)
            .finish();
        if let Some(domain) = &settings.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    pub(crate) fn challenge_cookie(
        settings: &CookieSettings,
        cipher: &ChallengeCipher,
        challenge: &ChallengeState,
    ) -> Result<Cookie<'static>, ChallengeError> {
        let serialized = serde_json::to_string(challenge)?;
        let encrypted = cipher.encrypt(&serialized)?;

        Ok(Cookie::build(COOKIE_AUTH_CHALLENGE_STATE, encrypted)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(settings.secure)
            .path(&CookiePath::Callback)
            .finish())
    }

    pub(crate) fn challenge_from_request(
        req: &HttpRequest,
        cipher: &ChallengeCipher,
    ) -> Result<ChallengeState, ChallengeError> {
        let cookie = req
            .cookie(COOKIE_AUTH_CHALLENGE_STATE)
            .ok_or(ChallengeError::Missing)?;
        let serialized = cipher.decrypt(cookie.value())?;

        Ok(serde_json::from_str::<ChallengeState>(&serialized)?)
    }

    pub(crate) fn remove_challenge_cookie(req: &HttpRequest, response: &mut HttpResponseBuilder) {
        Self::remove_cookie(
            req,
            response,
            COOKIE_AUTH_CHALLENGE_STATE,
            CookiePath::Callback,
            None,
        );
    }

    pub(crate) fn remove_access_token_cookie(
        req: &HttpRequest,
        settings: &CookieSettings,
        response: &mut HttpResponseBuilder,
    ) {
        Self::remove_cookie(
            req,
            response,
            ACCESS_TOKEN_COOKIE,
            CookiePath::All,
            settings.domain.as_deref(),
        );
    }

    fn remove_cookie(
        req: &HttpRequest,
        response: &mut HttpResponseBuilder,
        name: &str,
        path: CookiePath,
        domain: Option<&str>,
    ) {
        if let Some(mut dead_cookie) = req.cookie(name) {
            dead_cookie.make_removal();
            dead_cookie.set_path(&path);
            if let Some(domain) = domain {
                dead_cookie.set_domain(domain.to_owned());
            }
            response.cookie(dead_cookie);
        }
    }
}

/// AES-256-GCM sealing of the challenge cookie.
///
/// The output is hex encoded `nonce || ciphertext`, so it is safe as a cookie value.
#[derive(Clone)]
pub struct ChallengeCipher {
    key: Key<Aes256Gcm>,
}

impl fmt::Debug for ChallengeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChallengeCipher([redacted])")
    }
}

impl ChallengeCipher {
    const KEY_LENGTH: usize = 32;
    const NONCE_LENGTH: usize = 12;

    pub(crate) fn new(key: &[u8]) -> Result<Self, ChallengeError> {
        if key.len() != Self::KEY_LENGTH {
            return Err(ChallengeError::AesKey);
        }
        Ok(Self {
            key: Key::<Aes256Gcm>::from_slice(key).to_owned(),
        })
    }

    pub(crate) fn random() -> Self {
        Self {
            key: Aes256Gcm::generate_key(&mut OsRng),
        }
    }

    pub(crate) fn encrypt(&self, plaintext: &str) -> Result<String, ChallengeError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let cipher = Aes256Gcm::new(&self.key);

        let ciphered_data = cipher.encrypt(&nonce, plaintext.as_bytes())?;

        let mut encrypted_data = nonce.to_vec();
        encrypted_data.extend_from_slice(&ciphered_data);
        Ok(hex::encode(encrypted_data))
    }

    pub(crate) fn decrypt(&self, encrypted: &str) -> Result<String, ChallengeError> {
        let encrypted_data = hex::decode(encrypted)?;
        if encrypted_data.len() <= Self::NONCE_LENGTH {
            return Err(ChallengeError::Truncated);
        }

        let (nonce_vec, ciphered_text) = encrypted_data.split_at(Self::NONCE_LENGTH);
        let nonce = Nonce::from_slice(nonce_vec);

        let cipher = Aes256Gcm::new(&self.key);

        let plaintext = cipher.decrypt(nonce, ciphered_text)?;

        String::from_utf8(plaintext).map_err(ChallengeError::FromUtf8Error)
    }
}
