use async_trait::async_trait;
use micro_req_transport::{ResponseBody, Transport, TransportError, TransportRequest, TransportResponse};
use mockall::mock;

mock! {
    pub Transport {}

    #[async_trait]
    impl Transport for Transport {
        async fn perform(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
    }
}

pub fn ok(body: &'static str) -> Result<TransportResponse, TransportError> {
    Ok(http::Response::new(ResponseBody::from(body)))
}

pub fn respond_with(response: TransportResponse) -> Result<TransportResponse, TransportError> {
    Ok(response)
}
