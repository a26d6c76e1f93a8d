//! Dispatcher-facing handlers over a table's CRUD operations.

use crate::error::AppError;
use crate::request::RequestEnvelope;
use crate::routing::{Handler, Reply};
use crate::service::TableEndpoints;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrudOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl CrudOperation {
    pub const ALL: [CrudOperation; 5] = [
        CrudOperation::List,
        CrudOperation::Get,
        CrudOperation::Create,
        CrudOperation::Update,
        CrudOperation::Delete,
    ];

    /// Registry key suffix: `<table>.<operation>`.
    pub fn as_str(self) -> &'static str {
        match self {
            CrudOperation::List => "list",
            CrudOperation::Get => "get",
            CrudOperation::Create => "create",
            CrudOperation::Update => "update",
            CrudOperation::Delete => "delete",
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            CrudOperation::List | CrudOperation::Get => "GET",
            CrudOperation::Create => "POST",
            CrudOperation::Update => "PUT",
            CrudOperation::Delete => "DELETE",
        }
    }

    /// Operations addressed by `{id}` need a primary key.
    pub fn needs_id(self) -> bool {
        matches!(self, CrudOperation::Get | CrudOperation::Update | CrudOperation::Delete)
    }
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct CrudHandler {
    endpoints: Arc<TableEndpoints>,
    op: CrudOperation,
}

impl CrudHandler {
    pub fn new(endpoints: Arc<TableEndpoints>, op: CrudOperation) -> Self {
        CrudHandler { endpoints, op }
    }

    fn id<'a>(request: &'a RequestEnvelope) -> Result<&'a str, AppError> {
        request
            .param("id")
            .ok_or_else(|| AppError::BadRequest("Invalid id".into()))
    }
}

#[async_trait]
impl Handler for CrudHandler {
    async fn call(&self, request: &RequestEnvelope) -> Result<Reply, AppError> {
        let ep = &self.endpoints;
        let response = match self.op {
            CrudOperation::List => ep.list(&request.query).await?,
            CrudOperation::Get => ep.get(Self::id(request)?).await?,
            CrudOperation::Create => ep.create(&request.object_body()?).await?,
            CrudOperation::Update => ep.update(Self::id(request)?, &request.object_body()?).await?,
            CrudOperation::Delete => ep.delete(Self::id(request)?).await?,
        };
        Ok(Reply::Response(response))
    }
}
