//! Credential payload: `len(ssid) || ssid || len(password) || password`

/// Longest field that fits behind a one byte length prefix.
const MAX_FIELD_LEN: usize = u8::MAX as usize;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("{field} is {len} bytes long, at most 255 bytes fit in the payload")]
    InputTooLong { field: &'static str, len: usize },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload truncated while reading {0}")]
    Truncated(&'static str),
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("{0} unexpected bytes after password")]
    TrailingBytes(usize),
}

/// Wi-Fi credentials sent to the device in one bind attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindApRequest {
    pub ssid: String,
    pub password: String,
}

impl BindApRequest {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// Serialize the request. Lengths are UTF-8 byte counts, never wrapped.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let ssid = field_len("ssid", &self.ssid)?;
        let password = field_len("password", &self.password)?;

        let mut buf = Vec::with_capacity(2 + self.ssid.len() + self.password.len());
        buf.push(ssid);
        buf.extend_from_slice(self.ssid.as_bytes());
        buf.push(password);
        buf.extend_from_slice(self.password.as_bytes());
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let (ssid, rest) = read_field("ssid", data)?;
        let (password, rest) = read_field("password", rest)?;
        if !rest.is_empty() {
            return Err(DecodeError::TrailingBytes(rest.len()));
        }
        Ok(Self { ssid, password })
    }
}

/// Serialize an SSID/password pair into the bind payload.
pub fn encode(ssid: &str, password: &str) -> Result<Vec<u8>, EncodingError> {
    BindApRequest::new(ssid, password).to_bytes()
}

fn field_len(field: &'static str, value: &str) -> Result<u8, EncodingError> {
    let len = value.len();
    if len > MAX_FIELD_LEN {
        return Err(EncodingError::InputTooLong { field, len });
    }
    Ok(len as u8)
}

fn read_field<'a>(field: &'static str, data: &'a [u8]) -> Result<(String, &'a [u8]), DecodeError> {
    let (&len, rest) = data.split_first().ok_or(DecodeError::Truncated(field))?;
    let len = len as usize;
    if rest.len() < len {
        return Err(DecodeError::Truncated(field));
    }
    let (value, rest) = rest.split_at(len);
    let value = std::str::from_utf8(value).map_err(|_| DecodeError::InvalidUtf8(field))?;
    Ok((value.to_string(), rest))
}
