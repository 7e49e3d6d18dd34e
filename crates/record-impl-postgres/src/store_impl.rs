use chrono::{DateTime, Utc};
use record_core::{
  ImageId, ImageRecord, ImageRecordStoreLike, RecordStoreResult,
};

use crate::PostgresImageStore;

#[async_trait::async_trait]
impl ImageRecordStoreLike for PostgresImageStore {
  async fn file_backed_images(&self) -> RecordStoreResult<Vec<ImageRecord>> {
    self.file_backed_images().await
  }

  async fn update_image_address(
    &self,
    id: &ImageId,
    image_url: &str,
    updated_at: DateTime<Utc>,
  ) -> RecordStoreResult<()> {
    self.update_image_address(id, image_url, updated_at).await
  }
}
