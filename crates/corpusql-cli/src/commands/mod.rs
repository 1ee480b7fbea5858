//! Subcommand implementations

pub mod annotations;
pub mod layers;
pub mod search;
pub mod transcripts;

use crate::cli::QueryArgs;
use anyhow::Result;
use corpusql_query::QueryRequest;

/// Parse the expression and carry over the optional clauses
fn query_request(args: QueryArgs) -> Result<QueryRequest> {
    let mut request = QueryRequest::parse(&args.expression)?;
    request.columns = args.columns;
    request.user_where = args.where_clause;
    request.order_by = args.order;
    request.limit = args.limit;
    Ok(request)
}
