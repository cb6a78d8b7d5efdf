use crate::error::{AppError, Result};
use crate::services::submissions::{PhotoUpload, ReportSlothInput, SubmitSightingInput};

/// The maximum number of photos per submission.
pub const MAX_PHOTOS: usize = 3;
/// The maximum size of one photo payload.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
/// The maximum length of sighting notes.
pub const MAX_NOTES_LEN: usize = 500;

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::Validation(
            "Latitude must be between -90 and 90".to_string(),
        ));
    }

    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::Validation(
            "Longitude must be between -180 and 180".to_string(),
        ));
    }

    Ok(())
}

fn validate_notes(notes: &str) -> Result<()> {
    if notes.chars().count() >= MAX_NOTES_LEN {
        return Err(AppError::Validation(format!(
            "Notes must be shorter than {} characters",
            MAX_NOTES_LEN
        )));
    }

    Ok(())
}

fn validate_photos(photos: &[PhotoUpload], min_photos: usize) -> Result<()> {
    if photos.len() < min_photos {
        return Err(AppError::Validation(
            "At least one photo is required".to_string(),
        ));
    }

    if photos.len() > MAX_PHOTOS {
        return Err(AppError::Validation(format!(
            "At most {} photos are allowed",
            MAX_PHOTOS
        )));
    }

    for photo in photos {
        if photo.data.is_empty() {
            return Err(AppError::Validation("Photo file is empty".to_string()));
        }

        if photo.data.len() > MAX_PHOTO_BYTES {
            return Err(AppError::Validation(format!(
                "Each photo must be under {}MB",
                MAX_PHOTO_BYTES / 1024 / 1024
            )));
        }

        if let Some(content_type) = &photo.content_type {
            if !content_type.starts_with("image/") {
                return Err(AppError::Validation(
                    "Photos must be image files".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validates a discovery report before it reaches the submission saga.
pub fn validate_report(input: &ReportSlothInput) -> Result<()> {
    validate_coordinates(input.latitude, input.longitude)?;
    validate_notes(&input.notes)?;
    validate_photos(&input.photos, 1)
}

/// Validates a follow-up sighting; photos are optional here.
pub fn validate_followup(input: &SubmitSightingInput) -> Result<()> {
    if let Some(notes) = &input.notes {
        validate_notes(notes)?;
    }
    validate_photos(&input.photos, 0)
}
