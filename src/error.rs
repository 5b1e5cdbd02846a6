use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Geometry Error: {0}")]
    Geometry(String),

    #[error("homography is not configured")]
    NotConfigured,

    #[error("no samples collected for team clustering")]
    InsufficientData,

    #[error("Invalid Detections: {0}")]
    InvalidDetections(String),

    #[error("Invalid Weights: {0}")]
    InvalidWeights(String),

    #[error("Tracking Error: {0}")]
    Tracking(String),

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Classifier Error: {0}")]
    Classifier(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
