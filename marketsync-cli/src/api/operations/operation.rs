//! Core Operation types for ERP writes

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A single write that can be executed against the ERP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    /// Create a new record
    Create {
        /// Entity path relative to the entity root (e.g., "product", "customentity/<id>")
        entity: String,
        /// Record data as JSON
        data: Value,
    },
    /// Replace fields of an existing record
    Update {
        entity: String,
        /// Record ID (UUID)
        id: String,
        data: Value,
    },
    /// Attach an image to a product or variant
    /// POST /{entity}/{id}/images
    UploadImage {
        entity: String,
        id: String,
        filename: String,
        /// Base64 encoded file content
        content: String,
    },
}

/// Result of executing an Operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    /// The operation that was executed
    pub operation: Operation,
    pub success: bool,
    /// Response body (the created or updated record)
    pub data: Option<Value>,
    /// Error message if operation failed
    pub error: Option<String>,
    /// HTTP status code, absent for dry runs
    pub status_code: Option<u16>,
}

impl Operation {
    pub fn create(entity: impl Into<String>, data: Value) -> Self {
        Self::Create {
            entity: entity.into(),
            data,
        }
    }

    pub fn update(entity: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self::Update {
            entity: entity.into(),
            id: id.into(),
            data,
        }
    }

    pub fn upload_image(
        entity: impl Into<String>,
        id: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::UploadImage {
            entity: entity.into(),
            id: id.into(),
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Get the entity name for this operation
    pub fn entity(&self) -> &str {
        match self {
            Self::Create { entity, .. } => entity,
            Self::Update { entity, .. } => entity,
            Self::UploadImage { entity, .. } => entity,
        }
    }

    /// Path of the request relative to the entity root
    pub fn path(&self) -> String {
        match self {
            Self::Create { entity, .. } => entity.clone(),
            Self::Update { entity, id, .. } => format!("{}/{}", entity, id),
            Self::UploadImage { entity, id, .. } => format!("{}/{}/images", entity, id),
        }
    }

    /// Get the HTTP method for this operation
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::Create { .. } => "POST",
            Self::Update { .. } => "PUT",
            Self::UploadImage { .. } => "POST",
        }
    }

    /// Get the operation type as a string
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::UploadImage { .. } => "upload_image",
        }
    }

    /// Request body sent to the ERP
    pub fn body(&self) -> Value {
        match self {
            Self::Create { data, .. } | Self::Update { data, .. } => data.clone(),
            Self::UploadImage {
                filename, content, ..
            } => json!({
                "filename": filename,
                "content": content,
            }),
        }
    }
}

impl OperationResult {
    pub fn success(operation: Operation, data: Option<Value>, status_code: Option<u16>) -> Self {
        Self {
            operation,
            success: true,
            data,
            error: None,
            status_code,
        }
    }

    pub fn error(operation: Operation, error: String, status_code: Option<u16>) -> Self {
        Self {
            operation,
            success: false,
            data: None,
            error: Some(error),
            status_code,
        }
    }

    /// Result reported when writes are disabled
    pub fn dry_run(operation: Operation) -> Self {
        Self::success(operation, None, None)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    /// Get the result data, returning an error if the operation failed
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}
