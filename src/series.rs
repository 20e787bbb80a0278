use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use url::Url;

use crate::error::DataFetchError;
use crate::login::Session;
use crate::transport::Transport;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Consumption,
    Prices,
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKind::Consumption => write!(f, "consumption series"),
            SeriesKind::Prices => write!(f, "price series"),
        }
    }
}

/// Query for an hourly series of the `meteringPoints` API.
#[derive(Debug, Clone)]
pub struct SeriesQuery {
    kind: SeriesKind,
    /// Path segments below `meteringPoints`.
    point: [String; 2],
    customer: String,
    start: String,
    end: String,
}

impl SeriesQuery {
    /// Hourly electricity consumption of `metering_point`.
    pub fn consumption<TZ: TimeZone>(
        customer: &str,
        metering_point: &str,
        start: &DateTime<TZ>,
        end: &DateTime<TZ>,
        zone: &Tz,
    ) -> Self {
        Self {
            kind: SeriesKind::Consumption,
            point: ["ELECTRICITY".to_owned(), metering_point.to_owned()],
            customer: customer.to_owned(),
            start: format_timestamp(start, zone),
            end: format_timestamp(end, zone),
        }
    }

    /// Hourly spot prices as seen by `customer`.
    pub fn prices<TZ: TimeZone>(
        customer: &str,
        start: &DateTime<TZ>,
        end: &DateTime<TZ>,
        zone: &Tz,
    ) -> Self {
        Self {
            kind: SeriesKind::Prices,
            point: ["PRICE".to_owned(), "SPOT_PRICE#TART".to_owned()],
            customer: customer.to_owned(),
            start: format_timestamp(start, zone),
            end: format_timestamp(end, zone),
        }
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    fn products(&self) -> &'static str {
        match self.kind {
            SeriesKind::Consumption => "EL_ENERGY_CONSUMPTION",
            SeriesKind::Prices => "PRICE",
        }
    }

    /// Full request URL below `base`. `cache_buster` is sent as `_`, like the
    /// portal's own scripts do.
    pub fn url(&self, base: &Url, cache_buster: i64) -> Result<Url, DataFetchError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| DataFetchError::InvalidEndpoint {
                series: self.kind,
                base: base.clone(),
            })?
            .pop_if_empty()
            .extend(["api", "v3-2", "meteringPoints"])
            .extend(&self.point)
            .push("series");

        url.query_pairs_mut()
            .clear()
            .append_pair("_", &cache_buster.to_string())
            .append_pair("baseRateInAllResolutions", "false")
            .append_pair("companyAssociation", "NETWORK")
            .append_pair("customerNumber", &self.customer)
            .append_pair("startDate", &self.start)
            .append_pair("endDate", &self.end)
            .append_pair("productAssociations", "NETWORK,SALES,WHOLESALE")
            .append_pair("products", self.products())
            .append_pair("resolution", "DAYS_AS_HOURS")
            .append_pair("tariffDivision", "false")
            .append_pair("tariffRuleSource", "NETWORK");

        Ok(url)
    }
}

fn format_timestamp<TZ: TimeZone>(timestamp: &DateTime<TZ>, zone: &Tz) -> String {
    timestamp
        .with_timezone(zone)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

impl<T: Transport> Session<T> {
    /// Query hourly consumption of `metering_point` between `start` and `end`.
    ///
    /// The JSON document is returned as sent by the portal.
    #[tracing::instrument(err, skip(self), level = "info")]
    pub async fn consumption<TZ>(
        &self,
        customer: &str,
        metering_point: &str,
        start: DateTime<TZ>,
        end: DateTime<TZ>,
    ) -> Result<Value, DataFetchError>
    where
        TZ: TimeZone,
    {
        let query = SeriesQuery::consumption(
            customer,
            metering_point,
            &start,
            &end,
            &self.config.time_zone,
        );

        self.fetch_series(&query, &self.config.consumption_api).await
    }

    /// Query hourly spot prices between `start` and `end`.
    #[tracing::instrument(err, skip(self), level = "info")]
    pub async fn prices<TZ>(
        &self,
        customer: &str,
        start: DateTime<TZ>,
        end: DateTime<TZ>,
    ) -> Result<Value, DataFetchError>
    where
        TZ: TimeZone,
    {
        let query = SeriesQuery::prices(customer, &start, &end, &self.config.time_zone);

        self.fetch_series(&query, &self.config.price_api).await
    }

    async fn fetch_series(&self, query: &SeriesQuery, base: &Url) -> Result<Value, DataFetchError> {
        let series = query.kind();
        let url = query.url(base, Utc::now().timestamp_millis())?;

        let page = self
            .transport
            .get(url)
            .await
            .map_err(|source| DataFetchError::Request { series, source })?;
        if !page.status.is_success() {
            return Err(DataFetchError::Status {
                series,
                status: page.status,
            });
        }
        tracing::debug!(%series, body_len = page.body.len(), "received series");

        serde_json::from_str(&page.body).map_err(|source| DataFetchError::Json { series, source })
    }
}
