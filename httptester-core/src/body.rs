use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::Result;

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Field {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content: Bytes,
    },
}

impl MultipartPart {
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Field { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }
}

/// Request body; the two kinds are mutually exclusive on one builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Serialized JSON text, sent as `application/json; charset=utf-8`.
    Json(String),
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Attach the body to `builder`. The multipart form is rebuilt on every
    /// call so the same body can be sent more than once.
    pub(crate) fn apply(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        match self {
            RequestBody::Json(text) => Ok(builder
                .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
                .body(text.clone())),
            RequestBody::Multipart(parts) => Ok(builder.multipart(build_form(parts)?)),
        }
    }
}

fn build_form(parts: &[MultipartPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            MultipartPart::Field { name, value } => form.text(name.clone(), value.clone()),
            MultipartPart::File {
                name,
                file_name,
                content,
            } => {
                let mime_type = mime_guess::from_path(file_name)
                    .first_or_octet_stream()
                    .to_string();
                let part = Part::bytes(content.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(&mime_type)?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}
