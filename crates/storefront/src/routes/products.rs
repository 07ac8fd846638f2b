//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use thriftshop_core::ProductId;

use crate::backend::Product;
use crate::error::AppError;
use crate::filters;
use crate::routes::PageContext;
use crate::state::AppState;

/// Shown when the product has no description.
const NO_DESCRIPTION: &str = "No description available for this product yet.";

/// Product detail data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub description: String,
    pub stock: i64,
    pub images: Vec<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        let description = product
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(NO_DESCRIPTION)
            .to_string();

        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display(),
            description,
            stock: product.stock,
            images: product.image_url.clone(),
        }
    }
}

/// Gallery selection.
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub image: Option<usize>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductView,
    pub active_image: usize,
}

impl ProductShowTemplate {
    /// URL of the image shown large.
    #[must_use]
    pub fn active_image_url(&self) -> Option<&str> {
        self.product
            .images
            .get(self.active_image)
            .map(String::as_str)
    }
}

/// Display product detail page.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<GalleryQuery>,
    page: PageContext,
) -> Result<impl IntoResponse, AppError> {
    let product = state.backend().get_product(&ProductId::new(id)).await?;
    let product = ProductView::from(&product);
    let active_image = query
        .image
        .filter(|i| *i < product.images.len())
        .unwrap_or(0);

    Ok(ProductShowTemplate {
        page,
        product,
        active_image,
    })
}
