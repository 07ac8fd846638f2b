//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::backend::Product;
use crate::filters;
use crate::routes::PageContext;
use crate::state::AppState;

/// Product card data for templates.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image: Option<String>,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display(),
            image: product.primary_image().map(ToString::to_string),
        }
    }
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub products: Vec<ProductCardView>,
    pub error: Option<String>,
}

/// Display the product grid.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> impl IntoResponse {
    let (products, error) = match state.backend().list_products().await {
        Ok(products) => (products.iter().map(ProductCardView::from).collect(), None),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch products");
            (Vec::new(), Some(e.user_message()))
        }
    };

    HomeTemplate {
        page,
        products,
        error,
    }
}
