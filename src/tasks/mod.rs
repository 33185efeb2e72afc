pub mod reconciler;
pub mod refresh;
pub mod reminder;
pub mod shutdown;
