use crate::relay::submission::Attachment;

pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_RESUME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/rtf",
    "text/plain",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("resume is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("resume type '{0}' is not accepted")]
    UnsupportedType(String),
}

pub fn validate_resume(attachment: &Attachment) -> Result<(), AttachmentError> {
    if attachment.size() > MAX_RESUME_BYTES {
        return Err(AttachmentError::TooLarge {
            size: attachment.size(),
            max: MAX_RESUME_BYTES,
        });
    }

    let essence = attachment
        .content_type
        .parse::<mime::Mime>()
        .map(|parsed| parsed.essence_str().to_ascii_lowercase())
        .map_err(|_| AttachmentError::UnsupportedType(attachment.content_type.clone()))?;

    if ALLOWED_RESUME_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(AttachmentError::UnsupportedType(essence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn resume(content_type: &str, size: usize) -> Attachment {
        Attachment {
            file_name: "resume.pdf".to_string(),
            content_type: content_type.to_string(),
            data: Bytes::from(vec![0u8; size]),
        }
    }

    #[test]
    fn accepts_documents_up_to_the_ceiling() {
        assert_eq!(validate_resume(&resume("application/pdf", MAX_RESUME_BYTES)), Ok(()));
        assert_eq!(
            validate_resume(&resume("text/plain; charset=utf-8", 12)),
            Ok(())
        );
    }

    #[test]
    fn rejects_oversize_before_type() {
        assert_eq!(
            validate_resume(&resume("image/png", MAX_RESUME_BYTES + 1)),
            Err(AttachmentError::TooLarge {
                size: MAX_RESUME_BYTES + 1,
                max: MAX_RESUME_BYTES
            })
        );
    }

    #[test]
    fn rejects_types_outside_allow_list() {
        assert_eq!(
            validate_resume(&resume("image/png", 10)),
            Err(AttachmentError::UnsupportedType("image/png".to_string()))
        );
        assert!(matches!(
            validate_resume(&resume("garbage", 10)),
            Err(AttachmentError::UnsupportedType(_))
        ));
    }
}
