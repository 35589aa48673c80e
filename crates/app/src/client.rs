use api_types::{
    ErrorResponse,
    import::{ImportRequest, ImportSummary},
    transaction::{RecordId, RecordPatch, TransactionRecord},
};
use engine::{EngineError, RecordStore, ResultEngine};
use reqwest::{Response, StatusCode, Url};

use crate::error::{AppError, Result};

/// [`RecordStore`] backed by the transactions HTTP service.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| AppError::InvalidConfig(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> ResultEngine<Url> {
        self.base_url
            .join(path)
            .map_err(|err| EngineError::Server(format!("invalid base_url: {err}")))
    }

    fn record_endpoint(&self, id: &RecordId) -> ResultEngine<Url> {
        let mut url = self.endpoint("transactions")?;
        url.path_segments_mut()
            .map_err(|()| EngineError::Server("base_url cannot carry a path".to_string()))?
            .push(id.as_str());
        Ok(url)
    }
}

impl RecordStore for HttpStore {
    async fn fetch_records(&self) -> ResultEngine<Vec<TransactionRecord>> {
        let res = self
            .http
            .get(self.endpoint("transactions")?)
            .send()
            .await
            .map_err(transport)?;
        let res = check(res).await?;
        res.json::<Vec<TransactionRecord>>().await.map_err(transport)
    }

    async fn update_record(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> ResultEngine<TransactionRecord> {
        let res = self
            .http
            .patch(self.record_endpoint(id)?)
            .json(patch)
            .send()
            .await
            .map_err(transport)?;
        let res = check(res).await?;
        res.json::<TransactionRecord>().await.map_err(transport)
    }

    async fn delete_record(&self, id: &RecordId) -> ResultEngine<()> {
        let res = self
            .http
            .delete(self.record_endpoint(id)?)
            .send()
            .await
            .map_err(transport)?;
        check(res).await?;
        Ok(())
    }

    async fn import_records(&self, request: &ImportRequest) -> ResultEngine<ImportSummary> {
        let res = self
            .http
            .post(self.endpoint("transactions/import")?)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        let res = check(res).await?;
        res.json::<ImportSummary>().await.map_err(transport)
    }
}

fn transport(err: reqwest::Error) -> EngineError {
    EngineError::Transport(err.to_string())
}

/// Passes successful responses through and turns the rest into errors.
async fn check(res: Response) -> ResultEngine<Response> {
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status();
    let body = res
        .json::<ErrorResponse>()
        .await
        .map(|err| err.error)
        .unwrap_or_else(|_| "unknown error".to_string());
    tracing::debug!(%status, %body, "request rejected");
    Err(status_error(status, body))
}

fn status_error(status: StatusCode, body: String) -> EngineError {
    match status.as_u16() {
        404 => EngineError::NotFound(body),
        409 => EngineError::Conflict(body),
        400 | 422 => EngineError::Validation(body),
        _ => EngineError::Server(body),
    }
}
