//! Capture entry: form state, photo attachments and the submit workflow.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use fieldlog_types::models::{Capture, CaptureData, CaptureStatus, NewCapture};

use crate::aggregate::parse_measurement;
use crate::store::{ObjectStore, RecordStore, StoreError};

const MAX_FILE_NAME_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Location,
    Date,
    Time,
    Temperature,
    Humidity,
    WindSpeed,
    WaterLevel,
    WaterQuality,
    Observations,
}

impl Field {
    pub const REQUIRED: [Field; 4] = [Field::Title, Field::Location, Field::Date, Field::Time];
    pub const NUMERIC: [Field; 4] =
        [Field::Temperature, Field::Humidity, Field::WindSpeed, Field::WaterLevel];

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Location => "location",
            Field::Date => "date",
            Field::Time => "time",
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::WindSpeed => "wind speed",
            Field::WaterLevel => "water level",
            Field::WaterQuality => "water quality",
            Field::Observations => "observations",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureForm {
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub temperature: String,
    pub humidity: String,
    pub wind_speed: String,
    pub water_level: String,
    pub water_quality: String,
    pub observations: String,
}

impl CaptureForm {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Location => &self.location,
            Field::Date => &self.date,
            Field::Time => &self.time,
            Field::Temperature => &self.temperature,
            Field::Humidity => &self.humidity,
            Field::WindSpeed => &self.wind_speed,
            Field::WaterLevel => &self.water_level,
            Field::WaterQuality => &self.water_quality,
            Field::Observations => &self.observations,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Location => &mut self.location,
            Field::Date => &mut self.date,
            Field::Time => &mut self.time,
            Field::Temperature => &mut self.temperature,
            Field::Humidity => &mut self.humidity,
            Field::WindSpeed => &mut self.wind_speed,
            Field::WaterLevel => &mut self.water_level,
            Field::WaterQuality => &mut self.water_quality,
            Field::Observations => &mut self.observations,
        };
        *slot = value.into();
    }

    /// Required fields that are blank.
    pub fn missing_required(&self) -> Vec<Field> {
        Field::REQUIRED
            .into_iter()
            .filter(|f| self.get(*f).trim().is_empty())
            .collect()
    }

    /// Numeric fields holding text that will be left out of averages.
    /// Informational only: such values are still saved.
    pub fn numeric_warnings(&self) -> Vec<Field> {
        Field::NUMERIC
            .into_iter()
            .filter(|f| {
                let raw = self.get(*f);
                !raw.trim().is_empty() && parse_measurement(raw).is_none()
            })
            .collect()
    }

    /// Build the record to insert. Values are kept verbatim; only a blank
    /// description is dropped.
    pub fn compose(&self, photo_urls: Vec<String>) -> NewCapture {
        let description = Some(self.description.clone()).filter(|d| !d.trim().is_empty());
        NewCapture {
            title: self.title.clone(),
            description,
            data: CaptureData {
                location: self.location.clone(),
                date: self.date.clone(),
                time: self.time.clone(),
                temperature: self.temperature.clone(),
                humidity: self.humidity.clone(),
                wind_speed: self.wind_speed.clone(),
                water_level: self.water_level.clone(),
                water_quality: self.water_quality.clone(),
                observations: self.observations.clone(),
                photo_urls,
            },
            status: CaptureStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EntryState {
    #[default]
    Editing,
    Submitting,
    Submitted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("please fill in: {}", join_fields(.0))]
    MissingFields(Vec<Field>),
    #[error("failed to upload {file_name}: {source}")]
    Upload { file_name: String, source: StoreError },
    #[error("failed to save capture: {0}")]
    Insert(StoreError),
}

fn join_fields(fields: &[Field]) -> String {
    fields.iter().map(|f| f.label()).collect::<Vec<_>>().join(", ")
}

/// Reduce a client-supplied file name to the storage name alphabet.
fn sanitize_file_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        return "photo".to_string();
    }
    trimmed.chars().rev().take(MAX_FILE_NAME_LEN).collect::<Vec<_>>().into_iter().rev().collect()
}

/// Storage name for an uploaded photo: upload time in unix millis, a random
/// suffix so same-millisecond uploads of equal names cannot collide, and
/// the sanitized original file name.
pub fn photo_object_name(now: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "{}-{:08x}-{}",
        now.timestamp_millis(),
        rand::random::<u32>(),
        sanitize_file_name(file_name)
    )
}

/// Entry form component.
#[derive(Debug, Default)]
pub struct CaptureEntry {
    form: CaptureForm,
    photos: Vec<PhotoAttachment>,
    state: EntryState,
}

impl CaptureEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(&self) -> &CaptureForm {
        &self.form
    }

    pub fn photos(&self) -> &[PhotoAttachment] {
        &self.photos
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    /// Edit one field. Any earlier outcome message is cleared.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.form.set(field, value);
        self.state = EntryState::Editing;
    }

    pub fn attach(&mut self, photo: PhotoAttachment) {
        self.photos.push(photo);
        self.state = EntryState::Editing;
    }

    pub fn detach(&mut self, index: usize) -> Option<PhotoAttachment> {
        (index < self.photos.len()).then(|| self.photos.remove(index))
    }

    pub fn reset(&mut self) {
        self.form = CaptureForm::default();
        self.photos.clear();
        self.state = EntryState::Editing;
    }

    /// Upload the attached photos in order, then insert one draft capture
    /// referencing them.
    ///
    /// On failure nothing is inserted, photos uploaded by this call are
    /// removed again (best effort), and the state carries the error message.
    pub async fn submit<R, O>(
        &mut self,
        records: &R,
        objects: &O,
        now: DateTime<Utc>,
    ) -> Result<Capture, EntryError>
    where
        R: RecordStore,
        O: ObjectStore,
    {
        let missing = self.form.missing_required();
        if !missing.is_empty() {
            return Err(self.fail(EntryError::MissingFields(missing)));
        }

        self.state = EntryState::Submitting;

        let mut uploaded: Vec<String> = Vec::with_capacity(self.photos.len());
        let mut upload_error = None;
        for photo in &self.photos {
            let name = photo_object_name(now, &photo.file_name);
            if let Err(source) = objects.upload(&name, &photo.content_type, photo.bytes.clone()).await {
                upload_error = Some(EntryError::Upload { file_name: photo.file_name.clone(), source });
                break;
            }
            uploaded.push(name);
        }
        if let Some(err) = upload_error {
            discard_uploads(objects, &uploaded).await;
            return Err(self.fail(err));
        }

        let urls = uploaded.iter().map(|name| objects.public_url(name)).collect();
        let capture = match records.insert(self.form.compose(urls)).await {
            Ok(capture) => capture,
            Err(e) => {
                discard_uploads(objects, &uploaded).await;
                return Err(self.fail(EntryError::Insert(e)));
            }
        };

        info!(capture_id = %capture.id, photos = uploaded.len(), "Capture saved");
        self.form = CaptureForm::default();
        self.photos.clear();
        self.state = EntryState::Submitted;
        Ok(capture)
    }

    fn fail(&mut self, err: EntryError) -> EntryError {
        self.state = EntryState::Failed(err.to_string());
        err
    }
}

async fn discard_uploads<O: ObjectStore>(objects: &O, names: &[String]) {
    for name in names {
        if let Err(e) = objects.remove(name).await {
            warn!(object = %name, error = %e, "Could not remove photo from aborted submission");
        }
    }
}
