//! Admin product creation.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::{ImageUpload, NewProduct};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::models::Toast;
use crate::routes::PageContext;
use crate::state::AppState;

/// Most images a product may carry.
pub const MAX_IMAGES: usize = 5;

/// Upload limit for the whole form.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Why the form was refused before contacting the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProductFormError {
    #[error("Please enter a product name.")]
    MissingName,
    #[error("Price must be a whole number greater than zero.")]
    InvalidPrice,
    #[error("Stock must be a whole number.")]
    InvalidStock,
    #[error("Please choose at least one product photo.")]
    NoImages,
    #[error("A product can have at most 5 photos.")]
    TooManyImages,
    #[error("Only image files can be uploaded.")]
    NotAnImage,
}

/// The submitted form, before validation.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
    pub stock: String,
    pub description: String,
    pub images: Vec<ImageUpload>,
}

impl ProductForm {
    /// Read every part of the multipart body.
    ///
    /// File inputs left empty arrive as parts without a file name or body
    /// and are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid multipart.
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                if file_name.is_empty() || bytes.is_empty() {
                    continue;
                }
                form.images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
                continue;
            }

            let value = field.text().await?;
            match name.as_str() {
                "name" => form.name = value,
                "price" => form.price = value,
                "stock" => form.stock = value,
                "description" => form.description = value,
                _ => {}
            }
        }

        Ok(form)
    }

    /// Check the form and build the backend payload.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(self) -> Result<NewProduct, ProductFormError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ProductFormError::MissingName);
        }

        let price = self.price.trim();
        if !price.parse::<u64>().is_ok_and(|p| p > 0) {
            return Err(ProductFormError::InvalidPrice);
        }

        let stock = self.stock.trim();
        if stock.parse::<u32>().is_err() {
            return Err(ProductFormError::InvalidStock);
        }

        if self.images.is_empty() {
            return Err(ProductFormError::NoImages);
        }
        if self.images.len() > MAX_IMAGES {
            return Err(ProductFormError::TooManyImages);
        }
        if !self
            .images
            .iter()
            .all(|i| i.content_type.starts_with("image/"))
        {
            return Err(ProductFormError::NotAnImage);
        }

        Ok(NewProduct {
            name: name.to_string(),
            price: price.to_string(),
            stock: stock.to_string(),
            description: self.description.trim().to_string(),
            images: self.images,
        })
    }
}

/// Values echoed back into the form after a refusal.
#[derive(Default)]
pub struct ProductFormView {
    pub name: String,
    pub price: String,
    pub stock: String,
    pub description: String,
}

impl From<&ProductForm> for ProductFormView {
    fn from(form: &ProductForm) -> Self {
        Self {
            name: form.name.clone(),
            price: form.price.clone(),
            stock: form.stock.clone(),
            description: form.description.clone(),
        }
    }
}

/// New product page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/new_product.html")]
pub struct NewProductTemplate {
    pub page: PageContext,
    pub form: ProductFormView,
    pub error: Option<String>,
    pub max_images: usize,
}

/// Display the new product form.
#[instrument(skip_all)]
pub async fn new_form(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAdmin(_auth): RequireAdmin,
) -> impl IntoResponse {
    NewProductTemplate {
        page: PageContext::load(&session, &state, nonce).await,
        form: ProductFormView::default(),
        error: None,
        max_images: MAX_IMAGES,
    }
}

/// Create a product.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAdmin(auth): RequireAdmin,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = ProductForm::read(multipart)
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
    let echo = ProductFormView::from(&form);

    let product = match form.validate() {
        Ok(product) => product,
        Err(e) => return Ok(refuse(&session, &state, nonce, echo, e.to_string()).await),
    };

    let image_count = product.images.len();
    match state
        .backend()
        .create_product(&auth.access_token, product)
        .await
    {
        Ok(_) => {
            tracing::info!(user_id = %auth.user_id, images = image_count, "Product created");
            Toast::success("Product added.").queue(&session).await;
            Ok(Redirect::to("/admin?tab=products").into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Product creation failed");
            Ok(refuse(&session, &state, nonce, echo, e.user_message()).await)
        }
    }
}

/// Re-render the form with what was typed and the reason it was refused.
async fn refuse(
    session: &Session,
    state: &AppState,
    nonce: String,
    form: ProductFormView,
    message: String,
) -> Response {
    NewProductTemplate {
        page: PageContext::load(session, state, nonce).await,
        form,
        error: Some(message),
        max_images: MAX_IMAGES,
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn image(content_type: &str) -> ImageUpload {
        ImageUpload {
            file_name: "photo.jpg".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    fn form(images: usize) -> ProductForm {
        ProductForm {
            name: " Corduroy Pants ".to_string(),
            price: "85000".to_string(),
            stock: "1".to_string(),
            description: "Size 32".to_string(),
            images: (0..images).map(|_| image("image/jpeg")).collect(),
        }
    }

    #[test]
    fn test_valid_form_builds_payload() {
        let product = form(2).validate().unwrap();
        assert_eq!(product.name, "Corduroy Pants");
        assert_eq!(product.price, "85000");
        assert_eq!(product.images.len(), 2);
    }

    #[test]
    fn test_image_count_bounds() {
        assert_eq!(form(0).validate().unwrap_err(), ProductFormError::NoImages);
        assert!(form(MAX_IMAGES).validate().is_ok());
        assert_eq!(
            form(MAX_IMAGES + 1).validate().unwrap_err(),
            ProductFormError::TooManyImages
        );
    }

    #[test]
    fn test_rejects_bad_fields() {
        let mut f = form(1);
        f.name = "  ".to_string();
        assert_eq!(f.validate().unwrap_err(), ProductFormError::MissingName);

        let mut f = form(1);
        f.price = "0".to_string();
        assert_eq!(f.validate().unwrap_err(), ProductFormError::InvalidPrice);

        let mut f = form(1);
        f.stock = "-1".to_string();
        assert_eq!(f.validate().unwrap_err(), ProductFormError::InvalidStock);

        let mut f = form(1);
        f.images = vec![image("application/pdf")];
        assert_eq!(f.validate().unwrap_err(), ProductFormError::NotAnImage);
    }
}
