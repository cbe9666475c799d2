//! `ListBucketResult`的解析

use crate::s3::Error;
use serde::Deserialize;
use std::collections::BTreeSet;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectListing {
    pub bucket_name: String,
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: u32,
    pub is_truncated: bool,
    /// 只有设置了delimiter时服务端才会返回
    pub next_marker: Option<String>,
    /// 按key排序，和服务端返回的顺序一致
    pub entries: Vec<ObjectSummary>,
    pub common_prefixes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<OffsetDateTime>,
    pub e_tag: String,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    pub display_name: Option<String>,
}

impl ObjectListing {
    /// 截断时下一页的起点：`NextMarker`，没有的话用最后一个key
    pub fn next_page_marker(&self) -> Option<&str> {
        if !self.is_truncated {
            return None;
        }
        self.next_marker
            .as_deref()
            .or_else(|| self.entries.last().map(|e| e.key.as_str()))
    }
}

// region:    --- xml
#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    name: String,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    marker: Option<String>,
    #[serde(default)]
    delimiter: Option<String>,
    max_keys: u32,
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<Contents>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
    last_modified: String,
    #[serde(rename = "ETag")]
    e_tag: String,
    size: u64,
    #[serde(default)]
    storage_class: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    prefix: String,
}
// endregion: --- xml

// `<Prefix/>`和缺省都视为None
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

pub fn parse_listing(document: &[u8]) -> Result<ObjectListing, Error> {
    let raw: ListBucketResult = quick_xml::de::from_reader(document)?;

    let entries = raw
        .contents
        .into_iter()
        .map(|c| ObjectSummary {
            last_modified: OffsetDateTime::parse(c.last_modified.trim(), &Rfc3339).ok(),
            key: c.key,
            e_tag: c.e_tag,
            size: c.size,
            storage_class: non_empty(c.storage_class),
            owner: c.owner,
        })
        .collect();

    Ok(ObjectListing {
        bucket_name: raw.name,
        prefix: non_empty(raw.prefix),
        marker: non_empty(raw.marker),
        delimiter: non_empty(raw.delimiter),
        max_keys: raw.max_keys,
        is_truncated: raw.is_truncated,
        next_marker: non_empty(raw.next_marker),
        entries,
        common_prefixes: raw.common_prefixes.into_iter().map(|p| p.prefix).collect(),
    })
}
