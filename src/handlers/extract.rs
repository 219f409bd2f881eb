use axum::extract::FromRequest;

use crate::errors::AppError;

/// `Json` body whose rejections answer with the usual `{error, code}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
