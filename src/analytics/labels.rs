//! Batch resolution of opaque product ids into display labels.
//!
//! One catalog fetch for the whole id set, then a concurrent second level
//! (models plus the three variant categories), then brands gated on models.
//! Missing ids are simply omitted; the caller falls back to the raw id.

use std::collections::{BTreeSet, HashMap};

use tokio::try_join;

use super::fetcher::{RecordFetcher, RecordFilter, RecordKind};
use super::records::{decode_rows, CatalogEntry, CatalogModel, NamedRow};
use crate::error::{AnalyticsError, FetchStage};

pub const UNNAMED_SKU: &str = "Unnamed SKU";

pub struct LabelResolver<'a, F> {
    fetcher: &'a F,
}

impl<'a, F> LabelResolver<'a, F>
where
    F: RecordFetcher,
{
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }

    pub async fn resolve(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, String>, AnalyticsError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let entries: Vec<CatalogEntry> = self
            .fetch_by_ids(RecordKind::CatalogItems, FetchStage::Catalog, ids)
            .await?;

        let model_ids: BTreeSet<String> = entries
            .iter()
            .filter_map(|entry| entry.model_id.clone())
            .collect();
        let vehicle_ids: BTreeSet<String> = entries
            .iter()
            .filter_map(|entry| entry.vehicle_variant_id.clone())
            .collect();
        let accessory_ids: BTreeSet<String> = entries
            .iter()
            .filter_map(|entry| entry.accessory_variant_id.clone())
            .collect();
        let service_ids: BTreeSet<String> = entries
            .iter()
            .filter_map(|entry| entry.service_variant_id.clone())
            .collect();

        let (models, vehicle_variants, accessory_variants, service_variants): (
            Vec<CatalogModel>,
            Vec<NamedRow>,
            Vec<NamedRow>,
            Vec<NamedRow>,
        ) = try_join!(
            self.fetch_by_ids(
                RecordKind::CatalogModels,
                FetchStage::CatalogModels,
                &model_ids
            ),
            self.fetch_by_ids(
                RecordKind::VehicleVariants,
                FetchStage::CatalogVariants,
                &vehicle_ids
            ),
            self.fetch_by_ids(
                RecordKind::AccessoryVariants,
                FetchStage::CatalogVariants,
                &accessory_ids
            ),
            self.fetch_by_ids(
                RecordKind::ServiceVariants,
                FetchStage::CatalogVariants,
                &service_ids
            ),
        )?;

        let brand_ids: BTreeSet<String> = models
            .iter()
            .filter_map(|model| model.brand_id.clone())
            .collect();
        let brands: Vec<NamedRow> = self
            .fetch_by_ids(RecordKind::CatalogBrands, FetchStage::CatalogBrands, &brand_ids)
            .await?;

        let model_by_id: HashMap<&str, &CatalogModel> = models
            .iter()
            .filter(|model| !model.is_deleted)
            .map(|model| (model.id.as_str(), model))
            .collect();
        let brand_names = name_index(&brands);
        let mut variant_names = name_index(&vehicle_variants);
        variant_names.extend(name_index(&accessory_variants));
        variant_names.extend(name_index(&service_variants));

        let labels = entries
            .iter()
            .filter(|entry| !entry.is_deleted)
            .map(|entry| {
                let label = compose_label(entry, &model_by_id, &brand_names, &variant_names);
                (entry.id.clone(), label)
            })
            .collect();
        Ok(labels)
    }

    async fn fetch_by_ids<T>(
        &self,
        kind: RecordKind,
        stage: FetchStage,
        ids: &BTreeSet<String>,
    ) -> Result<Vec<T>, AnalyticsError>
    where
        T: serde::de::DeserializeOwned,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = RecordFilter::new().field_in("id", ids.iter().cloned());
        let rows = self
            .fetcher
            .fetch(kind, filter)
            .await
            .map_err(|source| AnalyticsError::fetch(stage, source))?;
        Ok(decode_rows(rows))
    }
}

fn name_index(rows: &[NamedRow]) -> HashMap<String, String> {
    rows.iter()
        .filter(|row| !row.is_deleted)
        .map(|row| (row.id.clone(), row.name.clone()))
        .collect()
}

fn compose_label(
    entry: &CatalogEntry,
    models: &HashMap<&str, &CatalogModel>,
    brand_names: &HashMap<String, String>,
    variant_names: &HashMap<String, String>,
) -> String {
    let model = entry
        .model_id
        .as_deref()
        .and_then(|id| models.get(id).copied());
    let brand = model
        .and_then(|model| model.brand_id.as_deref())
        .and_then(|id| brand_names.get(id))
        .map(String::as_str)
        .unwrap_or("");
    let model_name = model.map(|model| model.name.as_str()).unwrap_or("");
    let variant = entry
        .vehicle_variant_id
        .as_deref()
        .or(entry.accessory_variant_id.as_deref())
        .or(entry.service_variant_id.as_deref())
        .and_then(|id| variant_names.get(id))
        .map(String::as_str)
        .unwrap_or("");

    let mut label = [brand, model_name, variant]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if label.is_empty() {
        label = entry.name.trim().to_string();
    }
    if label.is_empty() {
        tracing::warn!(sku = %entry.id, "catalog entry has no resolvable name");
        label = UNNAMED_SKU.to_string();
    }
    if let Some(color) = entry.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        label = format!("{label} ({color})");
    }
    label
}
