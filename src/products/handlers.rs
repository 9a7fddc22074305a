use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    error::ApiError,
    messages,
    products::{
        dto::{ProductForm, ProductResponse},
        images::{self, ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES},
        repo::Product,
    },
    state::AppState,
};

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

struct ParsedUpload {
    form: ProductForm,
    /// Temp path of the uploaded image, if one was part of the form.
    temp_image: Option<PathBuf>,
}

/// Pull the product fields and optional `image` file out of a multipart body.
/// The image is written into the temp directory here; relocation into its
/// category directory happens only after the business rules pass.
async fn read_product_form(
    uploads_root: &FsPath,
    mut mp: Multipart,
) -> Result<ParsedUpload, ApiError> {
    let mut form = ProductForm::default();
    let mut temp_image = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
                    return Err(ApiError::Validation(messages::INVALID_IMAGE_TYPE.into()));
                }
                let original_name = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                temp_image =
                    Some(images::save_temp_upload(uploads_root, original_name.as_deref(), &data).await?);
            }
            "name" => form.name = Some(text_field(field).await?),
            "description" => form.description = Some(text_field(field).await?),
            "price" => {
                form.price = Some(text_field(field).await?.trim().parse().map_err(|_| {
                    ApiError::Validation("price must be a non-negative number".into())
                })?)
            }
            "stock" => {
                form.stock = Some(text_field(field).await?.trim().parse().map_err(|_| {
                    ApiError::Validation("stock must be a non-negative integer".into())
                })?)
            }
            "categories" | "categories[]" => {
                let id = text_field(field).await?.trim().parse().map_err(|_| {
                    ApiError::Validation("categories must contain numeric ids".into())
                })?;
                form.categories.get_or_insert_with(Vec::new).push(id);
            }
            _ => {}
        }
    }

    Ok(ParsedUpload { form, temp_image })
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))
}

/// Directory for a replacement image: first supplied category wins, else the
/// product's existing first category. None means the image has nowhere to go.
fn resolve_image_category(form: &ProductForm, existing: Option<&Product>) -> Option<i64> {
    form.categories
        .as_ref()
        .and_then(|c| c.first())
        .copied()
        .or_else(|| existing.and_then(|p| p.categories.first().copied()))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = Product::find_all(&state.db).await?;
    let base_url = &state.config.base_url;
    Ok(Json(
        products
            .into_iter()
            .map(|p| ProductResponse::from_product(p, base_url))
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = Product::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| {
            warn!(product_id = id, "product not found");
            ApiError::NotFound(messages::PRODUCT_NOT_FOUND.into())
        })?;
    Ok(Json(ProductResponse::from_product(
        product,
        &state.config.base_url,
    )))
}

#[instrument(skip(state, mp))]
pub async fn create_product(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let uploads_root = state.uploads_root();
    let parsed = read_product_form(&uploads_root, mp).await?;
    let new = parsed.form.into_new_product()?;

    // The image needs a category directory to live in; resolving it is a
    // business rule, not schema validation.
    let image_filename = match parsed.temp_image {
        Some(ref temp) => {
            let category_id = new.categories.first().copied().ok_or_else(|| {
                warn!(name = %new.name, "image supplied without category");
                ApiError::BusinessRule(messages::CATEGORY_REQUIRED.into())
            })?;
            Some(images::move_image(&uploads_root, temp, category_id).await?)
        }
        None => None,
    };

    let product = Product::create(&state.db, &new, image_filename.as_deref()).await?;
    info!(product_id = product.id, "product created");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse::from_product(product, &state.config.base_url)),
    ))
}

#[instrument(skip(state, mp))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mp: Multipart,
) -> Result<Json<ProductResponse>, ApiError> {
    let uploads_root = state.uploads_root();
    let parsed = read_product_form(&uploads_root, mp).await?;
    parsed.form.validate_update()?;

    // Snapshot the current row once: it supplies the category fallback for a
    // replacement image and, later, the old filename to clean up.
    let old = Product::find_by_id(&state.db, id).await?;

    // A replacement image resolves its directory from the supplied categories,
    // falling back to the product's existing first category.
    let image_filename = match parsed.temp_image {
        Some(ref temp) => {
            let category_id =
                resolve_image_category(&parsed.form, old.as_ref()).ok_or_else(|| {
                    warn!(product_id = id, "no category available for new image");
                    ApiError::BusinessRule(messages::CATEGORY_REQUIRED.into())
                })?;
            Some(images::move_image(&uploads_root, temp, category_id).await?)
        }
        None => None,
    };

    let product = Product::update(&state.db, id, &parsed.form, image_filename.as_deref())
        .await?
        .ok_or_else(|| {
            warn!(product_id = id, "product not found");
            ApiError::NotFound(messages::PRODUCT_NOT_FOUND.into())
        })?;

    // The previous image is cleaned up only when it was actually replaced,
    // and only after the update committed.
    if image_filename.is_some() {
        if let Some(old) = old {
            if let (Some(old_file), Some(old_category)) =
                (old.image_filename.as_deref(), old.categories.first())
            {
                images::delete_image(&uploads_root, *old_category, old_file).await;
            }
        }
    }

    info!(product_id = id, "product updated");
    Ok(Json(ProductResponse::from_product(
        product,
        &state.config.base_url,
    )))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let product = Product::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| {
            warn!(product_id = id, "product not found");
            ApiError::NotFound(messages::PRODUCT_NOT_FOUND.into())
        })?;

    if !Product::delete(&state.db, id).await? {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "failed to delete product {}",
            id
        )));
    }

    // Best-effort: a product without an image never touches the filesystem.
    if let (Some(filename), Some(category_id)) =
        (product.image_filename.as_deref(), product.categories.first())
    {
        images::delete_image(&state.uploads_root(), *category_id, filename).await;
    }

    info!(product_id = id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn product_with_categories(categories: Vec<i64>) -> Product {
        Product {
            id: 1,
            name: "Widget".into(),
            description: None,
            price: "10".parse().unwrap(),
            stock: 5,
            image_filename: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
            categories,
        }
    }

    fn form_with_categories(categories: Option<Vec<i64>>) -> ProductForm {
        ProductForm {
            categories,
            ..ProductForm::default()
        }
    }

    #[test]
    fn supplied_first_category_wins_over_existing() {
        let form = form_with_categories(Some(vec![7, 8]));
        let existing = product_with_categories(vec![2]);
        assert_eq!(resolve_image_category(&form, Some(&existing)), Some(7));
    }

    #[test]
    fn falls_back_to_existing_first_category() {
        let form = form_with_categories(None);
        let existing = product_with_categories(vec![2, 9]);
        assert_eq!(resolve_image_category(&form, Some(&existing)), Some(2));
    }

    #[test]
    fn empty_supplied_list_falls_back_to_existing() {
        let form = form_with_categories(Some(vec![]));
        let existing = product_with_categories(vec![4]);
        assert_eq!(resolve_image_category(&form, Some(&existing)), Some(4));
    }

    #[test]
    fn none_when_no_category_anywhere() {
        let form = form_with_categories(None);
        assert_eq!(resolve_image_category(&form, None), None);

        let existing = product_with_categories(vec![]);
        assert_eq!(resolve_image_category(&form, Some(&existing)), None);
    }
}
