use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::session::AuthContext,
    models::sloth::{Sloth, SlothStatus},
    services::submissions::{
        self, PhotoUpload, ReportSlothInput, SubmitSightingInput,
    },
    state::AppState,
    validation::sloths::{validate_followup, validate_report},
};

/// Body-size ceiling for submissions: 3 photos of 10 MB plus form overhead.
pub const MAX_SUBMISSION_BYTES: usize = 35 * 1024 * 1024;

/// Default radius for proximity queries, in kilometres.
const DEFAULT_NEAR_RADIUS_KM: f64 = 5.0;

#[derive(Deserialize)]
pub struct ListSlothsQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Serialize)]
pub struct SlothsResponse {
    pub sloths: Vec<Sloth>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    pub sloth_id: Uuid,
    pub sighting_id: Uuid,
    pub photo_count: usize,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Lists sloths, optionally restricted to a radius around a point.
#[axum::debug_handler]
pub async fn list_sloths(
    State(state): State<AppState>,
    Query(params): Query<ListSlothsQuery>,
) -> Result<impl IntoResponse> {
    let sloths = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => {
            state
                .sloths
                .sloths_near(lat, lon, params.radius_km.unwrap_or(DEFAULT_NEAR_RADIUS_KM))
                .await?
        }
        _ => state.sloths.list_sloths().await?,
    };

    let count = sloths.len();
    Ok(Json(SlothsResponse { sloths, count }))
}

/// A sloth with its sighting history and photos.
#[axum::debug_handler]
pub async fn sloth_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let detail = state.sloths.sloth_detail(id).await?.ok_or(AppError::NotFound)?;

    // A sloth without sightings is mid-submission or mid-rollback and
    // must not be served.
    if detail.sightings.is_empty() {
        return Err(AppError::NotFound);
    }

    Ok(Json(detail))
}

/// Reports a newly discovered sloth.
#[axum::debug_handler]
pub async fn report_sloth(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let user = context.require_user()?;

    let input = parse_report_form(multipart).await?;
    validate_report(&input)?;

    tracing::info!(
        "📝 Sloth report from user {} with {} photos",
        user.id,
        input.photos.len()
    );

    // Run the submission on its own task so a dropped connection cannot
    // abort it between the relational insert and compensation.
    let reported = tokio::spawn(submissions::report_sloth(
        state.sloths.clone(),
        state.images.clone(),
        user.id,
        input,
    ))
    .await
    .map_err(|e| AppError::Internal(format!("Submission task failed: {}", e)))??;

    let response = SubmissionResponse {
        success: true,
        message: "Sloth reported successfully!".to_string(),
        sloth_id: reported.sloth.id,
        sighting_id: reported.sighting.id,
        photo_count: reported.photos.len(),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Submits a follow-up sighting for an existing sloth.
#[axum::debug_handler]
pub async fn submit_sighting(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(sloth_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let user = context.require_user()?;

    let input = parse_sighting_form(multipart).await?;
    validate_followup(&input)?;

    let submitted = tokio::spawn(submissions::submit_sighting(
        state.sloths.clone(),
        state.images.clone(),
        user.id,
        sloth_id,
        input,
    ))
    .await
    .map_err(|e| AppError::Internal(format!("Submission task failed: {}", e)))??;

    let response = SubmissionResponse {
        success: true,
        message: "Sighting submitted successfully!".to_string(),
        sloth_id,
        sighting_id: submitted.sighting.id,
        photo_count: submitted.photos.len(),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Removes a follow-up sighting the caller owns.
#[axum::debug_handler]
pub async fn delete_sighting(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(sighting_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let user = context.require_user()?;

    submissions::delete_sighting(
        state.sloths.clone(),
        state.images.clone(),
        user.id,
        sighting_id,
    )
    .await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Sighting removed".to_string(),
    }))
}

/// Shared multipart accumulator for both submission forms.
#[derive(Default)]
struct SubmissionForm {
    latitude: Option<f64>,
    longitude: Option<f64>,
    sloth_status: Option<SlothStatus>,
    notes: Option<String>,
    photos: Vec<PhotoUpload>,
    captions: Vec<Option<String>>,
}

async fn collect_form(mut multipart: Multipart) -> Result<SubmissionForm> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Parse error: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "latitude" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(format!("latitude: {}", e)))?;
                form.latitude = Some(
                    text.parse()
                        .map_err(|_| AppError::Validation("Invalid latitude".to_string()))?,
                );
            }
            "longitude" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(format!("longitude: {}", e)))?;
                form.longitude = Some(
                    text.parse()
                        .map_err(|_| AppError::Validation("Invalid longitude".to_string()))?,
                );
            }
            "sloth_status" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(format!("sloth_status: {}", e)))?;
                form.sloth_status = Some(
                    text.parse()
                        .map_err(|_| AppError::Validation("Invalid sloth status".to_string()))?,
                );
            }
            "notes" => {
                form.notes = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Multipart(format!("notes: {}", e)))?,
                );
            }
            "photos" => {
                let filename = field.file_name().unwrap_or("photo").to_string();
                let content_type = field.content_type().map(|ct| ct.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Multipart(format!("photo data: {}", e)))?
                    .to_vec();
                form.photos.push(PhotoUpload {
                    data,
                    filename,
                    content_type,
                    caption: None,
                });
            }
            "captions" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(format!("captions: {}", e)))?;
                form.captions
                    .push(if text.is_empty() { None } else { Some(text) });
            }
            _ => {}
        }
    }

    // Captions pair with photos by position.
    for (photo, caption) in form.photos.iter_mut().zip(form.captions.drain(..)) {
        photo.caption = caption;
    }

    Ok(form)
}

async fn parse_report_form(multipart: Multipart) -> Result<ReportSlothInput> {
    let form = collect_form(multipart).await?;

    Ok(ReportSlothInput {
        latitude: form
            .latitude
            .ok_or_else(|| AppError::Validation("Missing latitude".to_string()))?,
        longitude: form
            .longitude
            .ok_or_else(|| AppError::Validation("Missing longitude".to_string()))?,
        notes: form
            .notes
            .ok_or_else(|| AppError::Validation("Missing notes".to_string()))?,
        photos: form.photos,
    })
}

async fn parse_sighting_form(multipart: Multipart) -> Result<SubmitSightingInput> {
    let form = collect_form(multipart).await?;

    Ok(SubmitSightingInput {
        sloth_status: form
            .sloth_status
            .ok_or_else(|| AppError::Validation("Missing sloth status".to_string()))?,
        notes: form.notes,
        photos: form.photos,
    })
}
