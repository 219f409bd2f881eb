use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Signed bearer token of the form `<user_id>.<signature>`.
pub fn issue_token(secret: &str, user_id: &str) -> String {
    let signature = match HmacSha1::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(user_id.as_bytes());
            ENGINE.encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };
    format!("{user_id}.{signature}")
}

/// Returns the user id carried by `token` if its signature checks out.
pub fn verify_token(secret: &str, token: &str) -> Option<String> {
    let (user_id, signature) = token.rsplit_once('.')?;
    if user_id.is_empty() {
        return None;
    }
    let signature = ENGINE.decode(signature).ok()?;

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(user_id.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(user_id.to_string())
}
