use serde::Deserialize;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct MoveContainerRequest {
    pub destination_id: String,
}
