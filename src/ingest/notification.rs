use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::ingest::storage::ObjectLocation;

/// An S3 event notification. Only the fields needed to find the object are
/// read; everything else in the payload is ignored.
#[derive(Debug, Deserialize)]
pub struct DeliveryNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<DeliveryRecord>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

// Keys arrive form-encoded: spaces as '+', everything else percent-escaped
fn decode_key(key: &str) -> String {
    let spaced = key.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

impl DeliveryNotification {
    pub fn locations(&self) -> Vec<ObjectLocation> {
        self.records
            .iter()
            .map(|record| ObjectLocation {
                bucket: record.s3.bucket.name.clone(),
                key: decode_key(&record.s3.object.key),
            })
            .collect()
    }
}
