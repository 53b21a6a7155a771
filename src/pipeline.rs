//! The three command line runs: order, resume and unpack.
use crate::catalog;
use crate::config::Config;
use crate::espa::EspaOps;
use crate::jobs;
use crate::order::{define_order, submit_order, OrderPolicy};
use crate::poller::{poll_order, PollOutcome, PollReport, PollSchedule};
use crate::product_filter::extract_products;
use crate::unpack::{unpack_scenes, UnpackOutcome};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// An order accepted by ESPA and the directory its items download into.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub order_id: String,
    pub data_dir: PathBuf,
}

/// Catalog file for this run, rebuilt from the bulk metadata when configured.
pub async fn prepare_catalog(config: &Config) -> Result<PathBuf> {
    if !config.process.download_catalogue {
        info!("Skipping download of latest Landsat metadata files");
        return Ok(config.catalog_path());
    }
    fs::create_dir_all(&config.process.root_folder)?;
    catalog::build_catalog(
        &reqwest::Client::new(),
        &config.catalogue.sources,
        &config.process.root_folder,
        &config.process.product_id_filename,
    )
    .await
}

/// File one order per tile and date range that has orderable scenes.
pub async fn submit_orders(
    api: &impl EspaOps,
    config: &Config,
    catalog: &Path,
) -> Result<Vec<SubmittedOrder>> {
    let policy = OrderPolicy::from(&config.api);
    let desired = &config.process.desired_sensors;
    let mut submitted = vec![];

    for path_row in &config.process.path_rows {
        let data_dir = config.download_dir(path_row);
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Unable to create {}", data_dir.display()))?;

        for range in &config.process.date_ranges {
            let products = extract_products(catalog, path_row, range)?;
            let order = if products.is_empty() {
                None
            } else {
                Some(define_order(api, &products, desired, &policy).await?)
            };

            match order.filter(|order| !order.is_empty()) {
                Some(order) => {
                    info!(
                        "Ordering {} scene(s) for path/row: {path_row}, date range: {range}, sensors: {:?}",
                        order.scene_count(),
                        order.collections()
                    );
                    let order_id = submit_order(api, &order).await?;
                    jobs::append_job(config.jobs_path(), &order_id)?;
                    submitted.push(SubmittedOrder {
                        order_id,
                        data_dir: data_dir.clone(),
                    });
                }
                None => info!(
                    "No items found for path/row: {path_row}, date range: {range}, sensors: {desired:?}"
                ),
            }
        }
    }
    Ok(submitted)
}

/// Ordering run: catalog, orders, then poll every order to completion.
pub async fn order_run(api: &impl EspaOps, config: &Config, catalog: &Path) -> Result<Vec<PollReport>> {
    let submitted = submit_orders(api, config, catalog).await?;
    info!("Submitted {} order(s)", submitted.len());

    let schedule = config.api.schedule();
    let mut reports = vec![];
    for order in &submitted {
        reports.push(poll_order(api, &order.order_id, &order.data_dir, &schedule).await?);
    }
    log_poll_summary(&reports);
    Ok(reports)
}

/// Resume run: poll every order in the jobs file, newest first.
pub async fn resume_run(
    api: &impl EspaOps,
    target_folder: &Path,
    jobs_file: &Path,
    schedule: &PollSchedule,
) -> Result<Vec<PollReport>> {
    let order_ids = jobs::read_jobs(jobs_file)?;
    info!("Resuming {} order(s) from {}", order_ids.len(), jobs_file.display());
    fs::create_dir_all(target_folder)?;

    let mut reports = vec![];
    for order_id in &order_ids {
        reports.push(poll_order(api, order_id, target_folder, schedule).await?);
    }
    log_poll_summary(&reports);
    Ok(reports)
}

pub fn unpack_run(source_folder: &Path, target_folder: &Path) -> Result<Vec<UnpackOutcome>> {
    let outcomes = unpack_scenes(source_folder, target_folder)?;
    let extracted = outcomes.iter().filter(|o| o.is_extracted()).count();
    info!(
        "Unpacked {extracted} archive(s), skipped {}",
        outcomes.len() - extracted
    );
    Ok(outcomes)
}

fn log_poll_summary(reports: &[PollReport]) {
    let downloaded: usize = reports.iter().map(|r| r.downloaded.len()).sum();
    info!("Downloaded {downloaded} file(s) from {} order(s)", reports.len());
    for report in reports.iter().filter(|r| r.outcome() == PollOutcome::Abandoned) {
        warn!(
            "Order {} abandoned with {} item(s) outstanding; resume it later from the jobs file",
            report.order_id,
            report.abandoned().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::espa::{Availability, OrderItem};
    use crate::order::Order;
    use serde_json::json;
    use std::cell::RefCell;

    const SCENE: &str = "LC08_L1TP_091084_20170101_20170218_01_T1";

    /// Accepts every candidate as an OLI/TIRS scene and completes items at once.
    #[derive(Default)]
    struct MockEspa {
        orders: RefCell<Vec<Order>>,
        downloads: RefCell<Vec<PathBuf>>,
    }

    impl EspaOps for MockEspa {
        async fn available_products(&self, inputs: &[String]) -> Result<Availability> {
            Ok(Availability::from_value(&json!({
                "olitirs8_collection": {"inputs": inputs, "products": ["sr"]}
            }))?)
        }

        async fn submit_order(&self, order: &Order) -> Result<String> {
            let mut orders = self.orders.borrow_mut();
            orders.push(order.clone());
            Ok(format!("espa-landsat@example.com-{:04}", orders.len()))
        }

        async fn item_status(&self, order_id: &str) -> Result<Vec<OrderItem>> {
            let index: usize = order_id.rsplit('-').next().unwrap().parse().unwrap();
            let orders = self.orders.borrow();
            Ok(orders[index - 1].collections["olitirs8_collection"]
                .inputs
                .iter()
                .map(|name| OrderItem {
                    name: name.clone(),
                    status: "complete".to_string(),
                    product_dload_url: Some(format!("https://edclpdsftp.cr.usgs.gov/orders/{name}.tar.gz")),
                })
                .collect())
        }

        async fn download(&self, url: &str, output_dir: &Path) -> Result<PathBuf> {
            let path = output_dir.join(crate::download::file_name_from_url(url)?);
            self.downloads.borrow_mut().push(path.clone());
            Ok(path)
        }
    }

    fn config(root: &Path) -> Config {
        toml::from_str(&format!(
            r#"
[process]
download_catalogue = false
product_id_filename = "ids.csv"
desired_sensors = ["olitirs8_collection"]
date_ranges = ["20170101_20170131", "20180101_20180131"]
path_rows = ["091084", "092084"]
root_folder = "{}"
"#,
            root.display()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_order_run_submits_polls_and_records_jobs() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());
        fs::write(
            config.catalog_path(),
            format!("LANDSAT_PRODUCT_ID\n{SCENE}\nLC08_L1TP_091084_20170615_20170629_01_T1\n"),
        )
        .unwrap();

        let api = MockEspa::default();
        let reports = order_run(&api, &config, &config.catalog_path()).await.unwrap();

        // Only 091084 in January 2017 has a scene
        assert_eq!(api.orders.borrow().len(), 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome(), PollOutcome::Completed);
        assert_eq!(
            api.downloads.borrow().as_slice(),
            &[config.download_dir("091084").join(format!("{SCENE}.tar.gz"))]
        );
        assert!(config.download_dir("092084").is_dir());
        assert_eq!(
            jobs::read_jobs(config.jobs_path()).unwrap(),
            vec!["espa-landsat@example.com-0001"]
        );
    }

    #[tokio::test]
    async fn test_resume_run_newest_first() {
        let root = tempfile::tempdir().unwrap();
        let api = MockEspa::default();
        let config = config(root.path());
        let catalog = root.path().join("ids.csv");
        fs::write(&catalog, format!("{SCENE}\n")).unwrap();
        submit_orders(&api, &config, &catalog).await.unwrap();

        let target = root.path().join("resumed");
        let reports = resume_run(&api, &target, &config.jobs_path(), &PollSchedule::default())
            .await
            .unwrap();
        assert_eq!(reports[0].order_id, "espa-landsat@example.com-0001");
        assert_eq!(api.downloads.borrow()[0], target.join(format!("{SCENE}.tar.gz")));
    }
}
