// multipart/form-data decoding
// Only what the upload form sends: named parts, optional filename and type.

use hyper::body::Bytes;

/// One decoded form part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("Content-Type is not multipart/form-data")]
    NotMultipart,
    #[error("multipart boundary is missing")]
    MissingBoundary,
    #[error("multipart body is malformed")]
    Malformed,
}

/// Extract the boundary from a `multipart/form-data` Content-Type value
pub fn boundary(content_type: &str) -> Result<String, MultipartError> {
    let mut params = content_type.split(';').map(str::trim);
    let mime = params.next().unwrap_or_default();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }

    params
        .filter_map(|p| p.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Split a multipart body into parts
pub fn parse(body: &Bytes, boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let first = format!("--{boundary}");
    // Every delimiter after the first is preceded by the CRLF ending the part data
    let delimiter = format!("\r\n--{boundary}");

    let mut pos = find(body, first.as_bytes(), 0).ok_or(MultipartError::Malformed)? + first.len();
    let mut parts = Vec::new();

    loop {
        // Closing delimiter
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        pos = skip_crlf(body, pos)?;

        let header_end = find(body, b"\r\n\r\n", pos).ok_or(MultipartError::Malformed)?;
        let headers = std::str::from_utf8(&body[pos..header_end])
            .map_err(|_| MultipartError::Malformed)?;
        let data_start = header_end + 4;

        let data_end =
            find(body, delimiter.as_bytes(), data_start).ok_or(MultipartError::Malformed)?;
        if let Some(part) = parse_part(headers, body.slice(data_start..data_end)) {
            parts.push(part);
        }
        pos = data_end + delimiter.len();
    }
}

fn parse_part(headers: &str, data: Bytes) -> Option<Part> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').map(str::trim) {
                if let Some((k, v)) = param.split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    Some(Part {
        name: name?,
        filename,
        content_type,
        data,
    })
}

fn skip_crlf(body: &[u8], pos: usize) -> Result<usize, MultipartError> {
    if body[pos..].starts_with(b"\r\n") {
        Ok(pos + 2)
    } else {
        Err(MultipartError::Malformed)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
