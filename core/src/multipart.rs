//! `multipart/form-data` body builder.
//!
//! Parts are written in the order they are added. The finished body and its
//! content type (with the boundary embedded) are handed to
//! `Requester::post_multipart` as-is.

use std::io::{self, Read};

use uuid::Uuid;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(&format!("shrinkix-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            body: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Append a plain text field.
    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.open_part(&format!("form-data; name=\"{}\"", escape(name)), None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(CRLF);
        self
    }

    /// Append a file part, streaming its content from `reader`.
    pub fn file(
        &mut self,
        name: &str,
        file_name: &str,
        content_type: &str,
        reader: &mut dyn Read,
    ) -> io::Result<&mut Self> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape(name),
            escape(file_name)
        );
        self.open_part(&disposition, Some(content_type));
        reader.read_to_end(&mut self.body)?;
        self.body.extend_from_slice(CRLF);
        Ok(self)
    }

    /// Write the closing boundary and return `(body, content_type)`.
    pub fn finish(mut self) -> (Vec<u8>, String) {
        let content_type = self.content_type();
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(CRLF);
        (self.body, content_type)
    }

    fn open_part(&mut self, disposition: &str, content_type: Option<&str>) {
        self.body.extend_from_slice(b"--");
        self.body.extend_from_slice(self.boundary.as_bytes());
        self.body.extend_from_slice(CRLF);
        self.body.extend_from_slice(b"Content-Disposition: ");
        self.body.extend_from_slice(disposition.as_bytes());
        self.body.extend_from_slice(CRLF);
        if let Some(ct) = content_type {
            self.body.extend_from_slice(b"Content-Type: ");
            self.body.extend_from_slice(ct.as_bytes());
            self.body.extend_from_slice(CRLF);
        }
        self.body.extend_from_slice(CRLF);
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

/// Guess a MIME type from a file name's extension.
pub fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
