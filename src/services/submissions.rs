use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::sloth::{
    NewPhoto, NewSighting, NewSloth, SightingKind, SlothStatus,
};
use crate::repositories::sloths::SlothRepository;
use crate::stores::images::ImageService;

/// A photo payload as parsed and validated at the request boundary.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: Option<String>,
    pub caption: Option<String>,
}

/// Validated input for reporting a newly discovered sloth.
#[derive(Debug, Clone)]
pub struct ReportSlothInput {
    pub latitude: f64,
    pub longitude: f64,
    pub notes: String,
    pub photos: Vec<PhotoUpload>,
}

/// Validated input for a follow-up sighting of a known sloth.
#[derive(Debug, Clone)]
pub struct SubmitSightingInput {
    pub sloth_status: SlothStatus,
    pub notes: Option<String>,
    pub photos: Vec<PhotoUpload>,
}

/// The fully-populated record group a successful report produces.
#[derive(Debug, Clone)]
pub struct ReportedSloth {
    pub sloth: NewSloth,
    pub sighting: NewSighting,
    pub photos: Vec<NewPhoto>,
}

/// The records a successful follow-up sighting produces.
#[derive(Debug, Clone)]
pub struct SubmittedSighting {
    pub sighting: NewSighting,
    pub photos: Vec<NewPhoto>,
}

/// What compensation managed to undo after a mid-submission failure.
///
/// Sub-step failures are recorded here and logged, never raised: partial
/// cleanup failure must not mask the primary error, and leaving an
/// unlogged orphan image is the worse outcome.
#[derive(Debug, Default)]
pub struct CompensationOutcome {
    pub images_deleted: usize,
    pub image_failures: Vec<String>,
    pub photo_rows_deleted: usize,
    pub row_failures: Vec<String>,
    pub sighting_deleted: bool,
    pub sloth_deleted: bool,
}

impl CompensationOutcome {
    fn log(&self, cause: &AppError) {
        tracing::warn!(
            images_deleted = self.images_deleted,
            image_failures = ?self.image_failures,
            photo_rows_deleted = self.photo_rows_deleted,
            row_failures = ?self.row_failures,
            sighting_deleted = self.sighting_deleted,
            sloth_deleted = self.sloth_deleted,
            "🧹 Submission rolled back after failure: {}",
            cause
        );
    }
}

/// Uploads photos strictly in input order, inserting a photo row after
/// each successful upload. On failure returns the cause together with the
/// image IDs already committed to the external service, in order.
async fn attach_photos(
    sloths: &dyn SlothRepository,
    images: &dyn ImageService,
    sighting_id: Uuid,
    uploader_id: Uuid,
    photos: Vec<PhotoUpload>,
) -> std::result::Result<Vec<NewPhoto>, (AppError, Vec<String>)> {
    let mut committed: Vec<String> = Vec::new();
    let mut records = Vec::new();

    for photo in photos {
        let photo_id = Uuid::new_v4();

        let image_id = match images
            .upload(photo.data, &photo.filename, photo_id, uploader_id)
            .await
        {
            Ok(image_id) => image_id,
            Err(e) => return Err((e, committed)),
        };
        committed.push(image_id.clone());

        let record = NewPhoto {
            id: photo_id,
            sighting_id,
            image_id,
            caption: photo.caption,
        };
        if let Err(e) = sloths.insert_photo(&record).await {
            return Err((e, committed));
        }
        records.push(record);
    }

    Ok(records)
}

/// Best-effort unwinding of a failed submission, run to completion.
///
/// Committed images are deleted first (external side effects are the ones
/// nothing else will clean up), then their rows, then the sighting, then
/// the sloth — dependents before parents.
async fn compensate(
    sloths: &dyn SlothRepository,
    images: &dyn ImageService,
    committed: &[String],
    sighting_id: Uuid,
    sloth_id: Option<Uuid>,
) -> CompensationOutcome {
    let mut outcome = CompensationOutcome::default();

    for image_id in committed {
        match images.delete(image_id).await {
            Ok(()) => outcome.images_deleted += 1,
            Err(e) => outcome.image_failures.push(format!("{}: {}", image_id, e)),
        }

        match sloths.delete_photo_by_image(image_id).await {
            Ok(()) => outcome.photo_rows_deleted += 1,
            Err(e) => outcome.row_failures.push(format!("photo {}: {}", image_id, e)),
        }
    }

    match sloths.delete_sighting(sighting_id).await {
        Ok(()) => outcome.sighting_deleted = true,
        Err(e) => outcome
            .row_failures
            .push(format!("sighting {}: {}", sighting_id, e)),
    }

    if let Some(sloth_id) = sloth_id {
        match sloths.delete_sloth(sloth_id).await {
            Ok(()) => outcome.sloth_deleted = true,
            Err(e) => outcome.row_failures.push(format!("sloth {}: {}", sloth_id, e)),
        }
    }

    outcome
}

/// Reports a new sloth: one sloth row, one discovery sighting, and the
/// photos, all-or-nothing.
///
/// The sloth and sighting are inserted in one relational transaction, so
/// a failure there needs no compensation. Photos are then uploaded in
/// input order; any upload or insert failure stops the loop, unwinds
/// everything already applied, and surfaces as `AppError::Upload`.
pub async fn report_sloth(
    sloths: Arc<dyn SlothRepository>,
    images: Arc<dyn ImageService>,
    reporter_id: Uuid,
    input: ReportSlothInput,
) -> Result<ReportedSloth> {
    let sloth = NewSloth {
        id: Uuid::new_v4(),
        latitude: input.latitude,
        longitude: input.longitude,
        status: SlothStatus::Active,
        discovered_by: reporter_id,
    };
    let sighting = NewSighting {
        id: Uuid::new_v4(),
        sloth_id: sloth.id,
        user_id: reporter_id,
        kind: SightingKind::Discovery,
        sloth_status: SlothStatus::Active,
        notes: Some(input.notes),
    };

    sloths.create_sloth_with_discovery(&sloth, &sighting).await?;
    tracing::info!(
        "🦥 Sloth {} reported by {} ({} photos pending)",
        sloth.id,
        reporter_id,
        input.photos.len()
    );

    match attach_photos(&*sloths, &*images, sighting.id, reporter_id, input.photos).await {
        Ok(photos) => {
            tracing::info!("✅ Sloth {} fully reported with {} photos", sloth.id, photos.len());
            Ok(ReportedSloth {
                sloth,
                sighting,
                photos,
            })
        }
        Err((cause, committed)) => {
            let outcome =
                compensate(&*sloths, &*images, &committed, sighting.id, Some(sloth.id)).await;
            outcome.log(&cause);
            Err(AppError::Upload(cause.to_string()))
        }
    }
}

/// Submits a follow-up sighting for an existing sloth.
///
/// Compensation here unwinds only what this submission created — the
/// photos and the new sighting row. The sloth predates the saga and is
/// never touched.
pub async fn submit_sighting(
    sloths: Arc<dyn SlothRepository>,
    images: Arc<dyn ImageService>,
    user_id: Uuid,
    sloth_id: Uuid,
    input: SubmitSightingInput,
) -> Result<SubmittedSighting> {
    if sloths.find_sloth(sloth_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let sighting = NewSighting {
        id: Uuid::new_v4(),
        sloth_id,
        user_id,
        kind: SightingKind::Followup,
        sloth_status: input.sloth_status,
        notes: input.notes,
    };
    sloths.insert_sighting(&sighting).await?;

    match attach_photos(&*sloths, &*images, sighting.id, user_id, input.photos).await {
        Ok(photos) => Ok(SubmittedSighting { sighting, photos }),
        Err((cause, committed)) => {
            let outcome = compensate(&*sloths, &*images, &committed, sighting.id, None).await;
            outcome.log(&cause);
            Err(AppError::Upload(cause.to_string()))
        }
    }
}

/// Removes a follow-up sighting the user owns, together with its photos.
///
/// Discovery sightings are refused: removing one would leave a sloth with
/// no sightings, which readers must never observe.
pub async fn delete_sighting(
    sloths: Arc<dyn SlothRepository>,
    images: Arc<dyn ImageService>,
    user_id: Uuid,
    sighting_id: Uuid,
) -> Result<()> {
    let sighting = sloths
        .find_sighting(sighting_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if sighting.user_id != user_id {
        return Err(AppError::NotFound);
    }

    if sighting.kind == SightingKind::Discovery {
        return Err(AppError::Validation(
            "A discovery sighting cannot be removed".to_string(),
        ));
    }

    let photos = sloths.photos_of_sighting(sighting_id).await?;
    for photo in &photos {
        // External deletes are best-effort; an orphan image is recoverable,
        // a half-deleted sighting is not.
        if let Err(e) = images.delete(&photo.image_id).await {
            tracing::warn!("Failed to delete image {}: {}", photo.image_id, e);
        }
        sloths.delete_photo_by_image(&photo.image_id).await?;
    }

    sloths.delete_sighting(sighting_id).await?;
    tracing::info!("🗑 Sighting {} removed by {}", sighting_id, user_id);
    Ok(())
}
