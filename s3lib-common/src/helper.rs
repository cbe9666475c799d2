use crate::Error;
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha1::Sha1;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// 输出格式: Day, DD Mon YYYY hh:mm:ss GMT
///
/// eg: Tue, 27 Mar 2007 19:36:42 GMT
pub fn gmt_format(date_time: &OffsetDateTime) -> Result<String, Error> {
    let s = date_time.to_offset(UtcOffset::UTC).format(format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    ))?;
    Ok(s)
}

/// 解析[gmt_format]格式的日期，如`Last-Modified`
pub fn parse_gmt(s: &str) -> Result<OffsetDateTime, Error> {
    let date_time = PrimitiveDateTime::parse(
        s.trim(),
        format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ),
    )?;
    Ok(date_time.assume_utc())
}

pub fn sign_hmac_sha1(secret: &str, str_to_sign: &str) -> Result<Vec<u8>, Error> {
    type HmacSha1 = Hmac<Sha1>;
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| Error::InvalidKeyLength)?;
    mac.update(str_to_sign.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// base64编码的128位MD5，用于`Content-MD5`
pub fn content_md5(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    general_purpose::STANDARD.encode(hasher.finalize())
}

pub fn into_header_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Result<HeaderMap, Error>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut header_map = HeaderMap::new();
    for (k, v) in map {
        let (k, v) = (k.as_ref(), v.as_ref());
        let name = HeaderName::from_bytes(k.as_bytes())
            .map_err(|_| Error::InvalidHeaderName(k.to_owned()))?;
        let value = HeaderValue::from_bytes(v.as_bytes())
            .map_err(|_| Error::InvalidHeaderValue(k.to_owned()))?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}
