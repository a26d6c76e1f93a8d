//! OpenAPI document for the generated CRUD routes, derived from the same table metadata.

use crate::schema::{ColumnMeta, SqlType, TableSchema};
use std::sync::Arc;
use utoipa::openapi::content::ContentBuilder;
use utoipa::openapi::info::InfoBuilder;
use utoipa::openapi::path::{
    HttpMethod, Operation, OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder, PathsBuilder,
};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::response::{Response, ResponseBuilder};
use utoipa::openapi::schema::{Array, KnownFormat, ObjectBuilder, Schema, SchemaFormat, Type};
use utoipa::openapi::{OpenApi, OpenApiBuilder, RefOr, Required};

pub const DOCS_PATH: &str = "/docs/openapi.json";

const JSON: &str = "application/json";

fn object(builder: ObjectBuilder) -> RefOr<Schema> {
    RefOr::T(Schema::Object(builder.build()))
}

fn typed(t: Type) -> ObjectBuilder {
    ObjectBuilder::new().schema_type(t)
}

fn formatted(t: Type, format: KnownFormat) -> ObjectBuilder {
    typed(t).format(Some(SchemaFormat::KnownFormat(format)))
}

/// JSON shape of one column as the API reads and writes it.
fn column_schema(column: &ColumnMeta) -> RefOr<Schema> {
    let builder = match column.sql_type {
        SqlType::Int | SqlType::TinyInt => formatted(Type::Integer, KnownFormat::Int32),
        SqlType::BigInt => formatted(Type::Integer, KnownFormat::Int64),
        SqlType::Float => formatted(Type::Number, KnownFormat::Float),
        SqlType::Double => formatted(Type::Number, KnownFormat::Double),
        SqlType::Decimal => typed(Type::String).description(Some("decimal, returned as text")),
        SqlType::Boolean => typed(Type::Boolean),
        SqlType::DateTime | SqlType::Timestamp => formatted(Type::String, KnownFormat::DateTime),
        SqlType::Date => formatted(Type::String, KnownFormat::Date),
        SqlType::Varchar | SqlType::Text | SqlType::Time => typed(Type::String),
        SqlType::Other => match column.native_type.as_deref() {
            Some("uuid") => formatted(Type::String, KnownFormat::Uuid),
            Some("json" | "jsonb") => ObjectBuilder::new(),
            _ => typed(Type::String),
        },
    };
    object(builder)
}

fn record_schema(table: &TableSchema) -> RefOr<Schema> {
    let builder = table
        .columns
        .iter()
        .fold(typed(Type::Object), |b, c| b.property(&c.name, column_schema(c)));
    object(builder)
}

/// Writable columns. Required ones are listed as such; the primary key is left out.
fn payload_schema(table: &TableSchema) -> RefOr<Schema> {
    let mut builder = typed(Type::Object);
    for column in table.columns.iter().filter(|c| !table.is_primary_key(&c.name)) {
        builder = builder.property(&column.name, column_schema(column));
        if column.is_required() {
            builder = builder.required(&column.name);
        }
    }
    object(builder)
}

fn envelope(data: Option<RefOr<Schema>>) -> RefOr<Schema> {
    let builder = typed(Type::Object)
        .property("status", object(typed(Type::String)))
        .property("message", object(typed(Type::String)))
        .required("status");
    object(match data {
        Some(d) => builder.property("data", d),
        None => builder,
    })
}

fn json_response(description: &str, data: Option<RefOr<Schema>>) -> Response {
    ResponseBuilder::new()
        .description(description)
        .content(JSON, ContentBuilder::new().schema(Some(envelope(data))).build())
        .build()
}

fn query_param(name: &str, t: Type, description: &str) -> ParameterBuilder {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .description(Some(description))
        .schema(Some(object(typed(t))))
}

fn id_param(table: &TableSchema) -> ParameterBuilder {
    let schema = match table.primary_key_column() {
        Some(pk) => column_schema(pk),
        None => object(typed(Type::String)),
    };
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .schema(Some(schema))
}

fn operation(table: &str, op: &str, summary: String) -> OperationBuilder {
    OperationBuilder::new()
        .tag(table)
        .operation_id(Some(format!("{}_{}", table, op)))
        .summary(Some(summary))
}

fn list_operation(table: &TableSchema) -> Operation {
    let name = &table.table_name;
    let rows = RefOr::T(Schema::Array(Array::new(record_schema(table))));
    operation(name, "list", format!("List {} records", name))
        .parameter(query_param("sort", Type::String, "Column to sort by"))
        .parameter(query_param("order", Type::String, "asc or desc"))
        .parameter(query_param("limit", Type::Integer, "Maximum rows, capped at 1000"))
        .parameter(query_param("offset", Type::Integer, "Rows to skip"))
        .response("200", json_response("Matching records", Some(rows)))
        .response("400", json_response("Invalid filter, sort or paging value", None))
        .build()
}

fn create_operation(table: &TableSchema) -> Operation {
    let name = &table.table_name;
    let body = RequestBodyBuilder::new()
        .content(JSON, ContentBuilder::new().schema(Some(payload_schema(table))).build())
        .required(Some(Required::True))
        .build();
    let created = object(typed(Type::Object).property("id", object(typed(Type::String))));
    operation(name, "create", format!("Create a {} record", name))
        .request_body(Some(body))
        .response("200", json_response("Record created", Some(created)))
        .response("422", json_response("Validation Error", None))
        .build()
}

fn get_operation(table: &TableSchema) -> Operation {
    let name = &table.table_name;
    operation(name, "get", format!("Get one {} record", name))
        .parameter(id_param(table))
        .response("200", json_response("The record", Some(record_schema(table))))
        .response("404", json_response("Record not found", None))
        .build()
}

fn update_operation(table: &TableSchema) -> Operation {
    let name = &table.table_name;
    let body = RequestBodyBuilder::new()
        .content(JSON, ContentBuilder::new().schema(Some(payload_schema(table))).build())
        .required(Some(Required::True))
        .build();
    operation(name, "update", format!("Replace a {} record", name))
        .parameter(id_param(table))
        .request_body(Some(body))
        .response("200", json_response("Record updated", None))
        .response("404", json_response("Record not found", None))
        .response("422", json_response("Validation Error", None))
        .build()
}

fn delete_operation(table: &TableSchema) -> Operation {
    let name = &table.table_name;
    operation(name, "delete", format!("Delete a {} record", name))
        .parameter(id_param(table))
        .response("200", json_response("Record deleted", None))
        .response("404", json_response("Record not found", None))
        .build()
}

/// One path pair per table under `prefix`. Tables without a primary key only get the collection path.
pub fn document(tables: &[Arc<TableSchema>], prefix: &str) -> OpenApi {
    let mut paths = PathsBuilder::new();
    for table in tables {
        let collection = format!("{}/{}", prefix, table.table_name);
        paths = paths.path(
            collection.clone(),
            PathItemBuilder::new()
                .operation(HttpMethod::Get, list_operation(table))
                .operation(HttpMethod::Post, create_operation(table))
                .build(),
        );
        if table.primary_key.is_some() {
            paths = paths.path(
                format!("{}/{{id}}", collection),
                PathItemBuilder::new()
                    .operation(HttpMethod::Get, get_operation(table))
                    .operation(HttpMethod::Put, update_operation(table))
                    .operation(HttpMethod::Delete, delete_operation(table))
                    .build(),
            );
        }
    }
    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(env!("CARGO_PKG_NAME"))
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some("Generated CRUD endpoints"))
                .build(),
        )
        .paths(paths.build())
        .build()
}
