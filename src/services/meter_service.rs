//! 抄表照片：上传处理、文字识别、确认与邮件发送

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageDecoder, ImageReader};
use serde::Serialize;
use std::{
    collections::HashMap,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::meter::*,
    repository::meter_repo::MeterRepository,
    services::{
        mail_service::{Mailer, OutgoingMail},
        ocr_service::TextRecognizer,
    },
};

/// 上传照片缩放后的最大宽度
const UPLOAD_MAX_WIDTH: u32 = 512;
const UPLOAD_JPEG_QUALITY: u8 = 75;
const OCR_JPEG_QUALITY: u8 = 90;
const BATCH_PAUSE: Duration = Duration::from_millis(200);

/// 识别后的一条记录
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedRecord {
    pub id: i64,
    pub file_name: String,
    pub apartment_code: Option<String>,
    pub electric_index: Option<i64>,
    pub raw_text: String,
}

fn decode(data: &[u8]) -> Result<DynamicImage, AppError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::BadRequest(format!("Invalid image: {}", e)))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| AppError::BadRequest(format!("Invalid image: {}", e)))?;
    let orientation = decoder
        .orientation()
        .map_err(|e| AppError::BadRequest(format!("Invalid image: {}", e)))?;
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| AppError::BadRequest(format!("Invalid image: {}", e)))?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.to_luma8()
        .write_with_encoder(encoder)
        .map_err(|e| AppError::Internal(format!("Failed to encode image: {}", e)))?;
    Ok(buffer)
}

/// 摆正、缩放到 512 宽、灰度、保留上方 2/3，输出 JPEG
pub fn process_upload(data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut img = decode(data)?;

    if img.width() > UPLOAD_MAX_WIDTH {
        let height = (u64::from(img.height()) * u64::from(UPLOAD_MAX_WIDTH) / u64::from(img.width())).max(1);
        img = img.resize_exact(UPLOAD_MAX_WIDTH, height as u32, FilterType::Triangle);
    }

    let img = img.grayscale();
    let keep = (img.height() * 2 / 3).max(1);
    let img = img.crop_imm(0, 0, img.width(), keep);

    encode_jpeg(&img, UPLOAD_JPEG_QUALITY)
}

/// 识别前只保留上方 75%，返回 base64
pub fn prepare_for_ocr(data: &[u8]) -> Result<String, AppError> {
    let img = decode(data)?;
    let keep = (img.height() * 3 / 4).max(1);
    let img = img.crop_imm(0, 0, img.width(), keep);
    Ok(STANDARD.encode(encode_jpeg(&img, OCR_JPEG_QUALITY)?))
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))?
}

pub struct MeterService {
    repo: MeterRepository,
    ocr: Arc<dyn TextRecognizer>,
    mailer: Option<Arc<dyn Mailer>>,
    upload_root: PathBuf,
    batch_size: usize,
}

impl MeterService {
    pub fn new(
        repo: MeterRepository,
        ocr: Arc<dyn TextRecognizer>,
        mailer: Option<Arc<dyn Mailer>>,
        upload_root: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Self {
        Self {
            repo,
            ocr,
            mailer,
            upload_root: upload_root.into(),
            batch_size: batch_size.max(1),
        }
    }

    fn month_dir(&self, month: MeterMonth) -> PathBuf {
        self.upload_root.join(month.folder())
    }

    fn photo_path(&self, reading: &MeterReading) -> Result<PathBuf, AppError> {
        let month = u32::try_from(reading.the_month)
            .map_err(|_| AppError::Internal(format!("Invalid month on reading {}", reading.id)))?;
        Ok(self
            .month_dir(MeterMonth {
                month,
                year: reading.the_year,
            })
            .join(&reading.file_name))
    }

    /// 处理并保存照片，写入一条读数记录，返回保存的文件名
    pub async fn upload(
        &self,
        month: MeterMonth,
        user_code: &str,
        original_name: &str,
        data: Vec<u8>,
    ) -> Result<String, AppError> {
        if data.is_empty() {
            return Err(AppError::BadRequest("Empty file provided.".to_string()));
        }

        let jpeg = blocking(move || process_upload(&data)).await?;
        let file_name = stored_file_name(&Uuid::new_v4().to_string(), original_name);

        let dir = self.month_dir(month);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {}", e)))?;
        tokio::fs::write(dir.join(&file_name), &jpeg)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to save image: {}", e)))?;

        let id = self.repo.insert(&file_name, month, user_code).await?;
        tracing::info!(id, file_name = %file_name, size = jpeg.len(), user_code, "Meter photo uploaded");
        Ok(file_name)
    }

    pub async fn readings(&self, month: MeterMonth) -> Result<Vec<MeterReading>, AppError> {
        self.repo.for_month(month).await
    }

    /// 读数照片内容
    pub async fn photo(&self, id: i64) -> Result<Vec<u8>, AppError> {
        let reading = self.repo.by_ids(&[id]).await?.into_iter().next().ok_or(AppError::NotFound)?;
        tokio::fs::read(self.photo_path(&reading)?)
            .await
            .map_err(|_| AppError::NotFound)
    }

    /// 分批识别选中的照片并保存结果
    pub async fn recognize(&self, ids: &[i64]) -> Result<Vec<RecognizedRecord>, AppError> {
        if ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one record.".to_string()));
        }

        let readings = self.repo.by_ids(ids).await?;
        let mut records = Vec::with_capacity(readings.len());

        for (batch_no, batch) in readings.chunks(self.batch_size).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }

            let loads = batch.iter().map(|reading| {
                let id = reading.id;
                let path = self.photo_path(reading);
                async move {
                    match path {
                        Ok(path) => load_for_ocr(id, path).await,
                        Err(e) => {
                            tracing::warn!(id, error = %e, "Meter photo path invalid");
                            None
                        }
                    }
                }
            });
            let loaded: Vec<Option<String>> = future::join_all(loads).await;
            let prepared: Vec<(&MeterReading, String)> = batch
                .iter()
                .zip(loaded)
                .filter_map(|(reading, image)| image.map(|img| (reading, img)))
                .collect();

            if prepared.is_empty() {
                continue;
            }

            let images: Vec<String> = prepared.iter().map(|(_, img)| img.clone()).collect();
            let texts = self.ocr.recognize(&images).await?;

            for ((reading, _), text) in prepared.into_iter().zip(texts) {
                let raw_text = text.unwrap_or_default();
                let extracted = extract_reading(&raw_text);
                self.repo
                    .save_recognition(
                        reading.id,
                        extracted.apartment_code.as_deref(),
                        extracted.electric_index,
                        &raw_text,
                    )
                    .await?;

                records.push(RecognizedRecord {
                    id: reading.id,
                    file_name: reading.file_name.clone(),
                    apartment_code: extracted.apartment_code,
                    electric_index: extracted.electric_index,
                    raw_text,
                });
            }
        }

        tracing::info!(selected = ids.len(), recognized = records.len(), "Meter photos recognized");
        Ok(records)
    }

    /// 保存人工确认后的读数，照片按公寓号重命名，返回更新条数
    pub async fn update_all(&self, updates: &[MeterUpdate]) -> Result<usize, AppError> {
        let ids: Vec<i64> = updates.iter().map(|u| u.id).collect();
        let existing: HashMap<i64, MeterReading> = self
            .repo
            .by_ids(&ids)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let mut updated = 0;
        for update in updates {
            let Some(reading) = existing.get(&update.id) else {
                tracing::warn!(id = update.id, "Meter reading not found, skipped");
                continue;
            };

            let apartment = update
                .apartment_code
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty());

            let mut file_name = reading.file_name.clone();
            if let Some(target) = apartment.and_then(|a| renamed_file_name(&reading.file_name, a)) {
                let from = self.photo_path(reading)?;
                let to = from.with_file_name(&target);
                // 目标文件已存在时直接覆盖
                match tokio::fs::rename(&from, &to).await {
                    Ok(()) => file_name = target,
                    Err(e) => tracing::warn!(
                        id = reading.id,
                        from = %from.display(),
                        error = %e,
                        "Failed to rename meter photo"
                    ),
                }
            }

            updated += self
                .repo
                .update(
                    update.id,
                    apartment,
                    update.electric_index,
                    update.raw_text.as_deref(),
                    &file_name,
                )
                .await? as usize;
        }

        tracing::info!(requested = updates.len(), updated, "Meter readings confirmed");
        Ok(updated)
    }

    /// 将照片作为附件发给住户
    pub async fn send_email(&self, request: &SendEmailRequest, month: MeterMonth) -> Result<(), AppError> {
        let Some(mailer) = &self.mailer else {
            return Err(AppError::BadRequest("Email is not configured.".to_string()));
        };

        let file_name = request.file_name.trim();
        if file_name.is_empty() || sanitize_file_name(file_name) != file_name {
            return Err(AppError::BadRequest("Invalid file name.".to_string()));
        }

        let path: PathBuf = self.month_dir(month).join(Path::new(file_name));
        let attachment = tokio::fs::read(&path)
            .await
            .map_err(|_| AppError::BadRequest("Attachment file not found.".to_string()))?;

        let apartment = request.apartment.as_deref().map(str::trim).unwrap_or_default();
        mailer
            .send(OutgoingMail {
                to: request.email.trim().to_string(),
                subject: email_subject(apartment, month),
                body: email_body(apartment, month),
                attachment_name: file_name.to_string(),
                attachment,
            })
            .await
    }
}

/// 读取照片并转成识别用的 base64，缺失或无法解码时跳过
async fn load_for_ocr(id: i64, path: PathBuf) -> Option<String> {
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(id, path = %path.display(), error = %e, "Meter photo missing");
            return None;
        }
    };
    match blocking(move || prepare_for_ocr(&data)).await {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(id, error = %e, "Meter photo unreadable");
            None
        }
    }
}
