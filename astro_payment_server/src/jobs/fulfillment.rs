//! The fulfillment work unit. When a payment for a reading request is approved, this job builds
//! the chart subjects from the stored request, asks AstroCalc for the reading, and hands the
//! result to the automation webhook. The product-job gate in the engine guarantees the unit runs
//! to success at most once per `(request, product, trigger)` triple, so it is safe to kick this
//! off from every APPROVED event, including replays.
use astro_payment_engine::{
    db_types::{JobMetrics, ProductJob, ProductType, ReadingRequest, TriggerStatus},
    traits::{JobApiError, JobManagement, RequestManagement},
    ProductJobApi,
};
use astrocalc_tools::{AstroCalcApi, AutomationApi, ChartSubject, DeliveryPayload};
use chrono::{NaiveDate, NaiveTime};
use log::*;
use serde_json::json;
use thiserror::Error;

use crate::jobs::retry::{call_with_retry, RetryPolicy};

//--------------------------------------     Field coercion   --------------------------------------------------------

/// A stored request field that cannot be turned into what the chart service accepts. Coercion
/// failures are permanent, so the job fails straight away without spending any outbound calls.
#[derive(Debug, Clone, Error)]
#[error("Field '{field}' with value '{raw}' cannot be used for chart calculation. {reason}")]
pub struct CoercionError {
    pub field: &'static str,
    pub raw: String,
    pub reason: String,
}

impl CoercionError {
    fn new<S1: Into<String>, S2: Into<String>>(field: &'static str, raw: S1, reason: S2) -> Self {
        Self { field, raw: raw.into(), reason: reason.into() }
    }

    fn missing(field: &'static str) -> Self {
        Self::new(field, "<missing>", "A relationship reading needs both subjects")
    }
}

/// The chart call a request resolves to.
#[derive(Debug, Clone)]
pub enum ChartPayload {
    Natal(ChartSubject),
    Synastry(ChartSubject, ChartSubject),
}

/// Builds the chart subject(s) for a request, validating every field on the way.
///
/// Dates must be `YYYY-MM-DD`, times `HH:MM`, latitude in [-90, 90], longitude in [-180, 180]
/// and the UTC offset in [-12, 14]. Relationship readings additionally require the full set of
/// partner fields; the partner is read in the requester's stored UTC offset since the intake form
/// captures a single offset per request.
pub fn build_chart_subjects(request: &ReadingRequest) -> Result<ChartPayload, CoercionError> {
    let subject = ChartSubject {
        name: request.customer_name.clone(),
        birth_date: coerce_date("birth_date", &request.birth_date)?,
        birth_time: coerce_time("birth_time", &request.birth_time)?,
        birth_place: request.birth_place.clone(),
        latitude: coerce_range("latitude", request.latitude, -90.0, 90.0)?,
        longitude: coerce_range("longitude", request.longitude, -180.0, 180.0)?,
        utc_offset_hours: coerce_range("utc_offset_hours", request.utc_offset_hours, -12.0, 14.0)?,
    };
    match request.product_type {
        ProductType::BirthChart => Ok(ChartPayload::Natal(subject)),
        ProductType::RelationshipReading => {
            let name = request.partner_name.clone().ok_or_else(|| CoercionError::missing("partner_name"))?;
            let date = request.partner_birth_date.as_deref().ok_or_else(|| CoercionError::missing("partner_birth_date"))?;
            let time = request.partner_birth_time.as_deref().ok_or_else(|| CoercionError::missing("partner_birth_time"))?;
            let place =
                request.partner_birth_place.clone().ok_or_else(|| CoercionError::missing("partner_birth_place"))?;
            let lat = request.partner_latitude.ok_or_else(|| CoercionError::missing("partner_latitude"))?;
            let lon = request.partner_longitude.ok_or_else(|| CoercionError::missing("partner_longitude"))?;
            let partner = ChartSubject {
                name,
                birth_date: coerce_date("partner_birth_date", date)?,
                birth_time: coerce_time("partner_birth_time", time)?,
                birth_place: place,
                latitude: coerce_range("partner_latitude", lat, -90.0, 90.0)?,
                longitude: coerce_range("partner_longitude", lon, -180.0, 180.0)?,
                utc_offset_hours: subject.utc_offset_hours,
            };
            Ok(ChartPayload::Synastry(subject, partner))
        },
    }
}

fn coerce_date(field: &'static str, raw: &str) -> Result<NaiveDate, CoercionError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| CoercionError::new(field, raw, format!("Expected a YYYY-MM-DD date. {e}")))
}

fn coerce_time(field: &'static str, raw: &str) -> Result<NaiveTime, CoercionError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|e| CoercionError::new(field, raw, format!("Expected a 24h HH:MM time. {e}")))
}

fn coerce_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, CoercionError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(CoercionError::new(field, format!("{value}"), format!("Expected a value between {min} and {max}")))
    }
}

//--------------------------------------   Fulfillment job    --------------------------------------------------------

/// Runs the fulfillment unit for a request through the idempotency gate.
///
/// The returned row is the terminal job record: SUCCEEDED after a full enrichment + delivery,
/// FAILED with a stored reason otherwise, or the prior winning row when the gate reports the work
/// was already done. Only bookkeeping failures (the job table itself being unwritable) surface as
/// `Err`.
pub async fn run_fulfillment_job<B>(
    db: &B,
    charts: &AstroCalcApi,
    automation: &AutomationApi,
    policy: RetryPolicy,
    request_id: i64,
    product_type: ProductType,
    trigger: TriggerStatus,
) -> Result<ProductJob, JobApiError>
where
    B: JobManagement + RequestManagement + Clone,
{
    let jobs = ProductJobApi::new(db.clone());
    let gate = jobs.start(request_id, product_type, trigger).await?;
    if gate.already_done() {
        debug!("⚙️ Request {request_id} was already fulfilled by job {}. Nothing to do.", gate.job().id);
        return Ok(gate.job().clone());
    }
    let job_id = gate.job().id;
    info!("⚙️ Starting fulfillment job {job_id} for request {request_id} (attempt {})", gate.job().attempt);
    let mut metrics = JobMetrics::default();

    let request = match db.fetch_reading_request(request_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            warn!("⚙️ Fulfillment job {job_id} aborted. Reading request {request_id} does not exist.");
            return jobs.fail(job_id, &format!("Reading request {request_id} does not exist"), metrics).await;
        },
        Err(e) => {
            warn!("⚙️ Fulfillment job {job_id} aborted. Could not load reading request {request_id}. {e}");
            return jobs.fail(job_id, &format!("Could not load reading request {request_id}: {e}"), metrics).await;
        },
    };

    if !automation.is_configured() {
        warn!("⚙️ Fulfillment job {job_id} cannot run. The automation webhook URL is not configured.");
        let reason = "Automation webhook is not configured. Set APG_AUTOMATION_WEBHOOK_URL to enable delivery.";
        return jobs.fail(job_id, reason, metrics).await;
    }

    let payload = match build_chart_subjects(&request) {
        Ok(p) => p,
        Err(e) => {
            warn!("⚙️ Fulfillment job {job_id} rejected its request data. {e}");
            return jobs.fail(job_id, &e.to_string(), metrics).await;
        },
    };

    let outcome = match &payload {
        ChartPayload::Natal(subject) => call_with_retry(policy, || charts.natal_chart(subject)).await,
        ChartPayload::Synastry(a, b) => call_with_retry(policy, || charts.synastry_chart(a, b)).await,
    };
    metrics.enrichment_attempts = Some(i64::from(outcome.attempts));
    metrics.enrichment_ms = Some(outcome.elapsed_ms);
    let chart = match outcome.result {
        Ok(chart) => {
            metrics.enrichment_http_status = Some(200);
            chart
        },
        Err(e) => {
            metrics.enrichment_http_status = e.status().map(i64::from);
            warn!("⚙️ Fulfillment job {job_id} failed during chart calculation after {} attempts. {e}", outcome.attempts);
            return jobs.fail(job_id, &format!("Chart calculation failed: {e}"), metrics).await;
        },
    };

    let mut delivery = DeliveryPayload::new(
        request.id,
        request.product_type.to_string(),
        request.customer_name.clone(),
        request.customer_email.clone(),
        chart,
    );
    delivery.meta = json!({
        "provider": request.payment_provider.map(|p| p.as_tag()),
        "payment_id": request.payment_id,
        "amount": request.payment_amount.map(|a| a.value()),
        "currency": request.payment_currency,
        "authorized_at": request.authorized_at,
    });

    let outcome = call_with_retry(policy, || automation.deliver(&delivery)).await;
    metrics.delivery_attempts = Some(i64::from(outcome.attempts));
    metrics.delivery_ms = Some(outcome.elapsed_ms);
    match outcome.result {
        Ok(status) => {
            metrics.delivery_http_status = Some(i64::from(status));
            info!("⚙️ Fulfillment job {job_id} for request {request_id} delivered. Automation replied {status}.");
            jobs.complete(job_id, metrics).await
        },
        Err(e) => {
            metrics.delivery_http_status = e.status().map(i64::from);
            warn!("⚙️ Fulfillment job {job_id} failed during delivery after {} attempts. {e}", outcome.attempts);
            jobs.fail(job_id, &format!("Automation delivery failed: {e}"), metrics).await
        },
    }
}
