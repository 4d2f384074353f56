//! JSON API over the entry repository.
//!
//! Repository calls block on the store, so each one runs on the blocking
//! thread pool rather than on an async worker.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Entry;
use crate::repo::Repository;
use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{delete, get, post, web, App, HttpResponse, HttpServer, ResponseError};
use log::{error, info};
use serde::Serialize;

type Repo = web::Data<Repository>;

#[derive(Serialize)]
struct Status {
    ok: bool,
}

#[derive(Serialize)]
struct Detail {
    detail: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::IdentityMismatch { .. } | Error::Store(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        if code.is_server_error() {
            error!("{}", self);
        }
        HttpResponse::build(code).json(Detail {
            detail: self.to_string(),
        })
    }
}

async fn blocking<T, F>(repo: Repo, f: F) -> Result<T>
where
    F: FnOnce(&Repository) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || f(&repo))
        .await
        .map_err(|e| Error::Store(e.to_string().into()))?
}

/// Bodies that are not JSON at all get a 400; JSON that fails field
/// validation or misses a field gets a 422.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let code = match &err {
            JsonPayloadError::Deserialize(e) if e.is_data() => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::BAD_REQUEST,
        };
        let response = HttpResponse::build(code).json(Detail {
            detail: err.to_string(),
        });
        InternalError::from_response(err, response).into()
    })
}

/// Path segments that do not parse (a non-numeric id) are a 422, so they are
/// not confused with a missing entry.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::UnprocessableEntity().json(Detail {
            detail: err.to_string(),
        });
        InternalError::from_response(err, response).into()
    })
}

#[get("/status/")]
async fn get_status() -> HttpResponse {
    HttpResponse::Ok().json(Status { ok: true })
}

#[get("/entries/")]
async fn list_entries(repo: Repo) -> Result<HttpResponse> {
    let entries = blocking(repo, |r| r.get_all()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[post("/entries/")]
async fn create_entry(repo: Repo, body: web::Json<Entry>) -> Result<HttpResponse> {
    let entry = body.into_inner();
    let stored = blocking(repo, move |r| {
        r.insert_or_get(&entry)?;
        r.get(&entry)
    })
    .await?;
    Ok(HttpResponse::Ok().json(stored))
}

#[get("/entries/{vmname}/")]
async fn vm_entries(repo: Repo, vmname: web::Path<String>) -> Result<HttpResponse> {
    let vmname = vmname.into_inner();
    let entries = blocking(repo, move |r| r.get_for_vmname(&vmname)).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[delete("/entries/{vmname}/")]
async fn delete_vm_entries(repo: Repo, vmname: web::Path<String>) -> Result<HttpResponse> {
    let vmname = vmname.into_inner();
    let deleted = blocking(repo, move |r| r.delete_for_vmname(&vmname)).await?;
    Ok(HttpResponse::Ok().json(deleted))
}

#[delete("/entries/{vmname}/{id}")]
async fn delete_entry(repo: Repo, path: web::Path<(String, i64)>) -> Result<HttpResponse> {
    let (vmname, id) = path.into_inner();
    blocking(repo, move |r| r.delete_checked(&vmname, id)).await?;
    Ok(HttpResponse::Ok().finish())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .service(get_status)
        .service(list_entries)
        .service(create_entry)
        .service(vm_entries)
        .service(delete_vm_entries)
        .service(delete_entry);
}

pub async fn serve(repo: Repo, config: &Config) -> std::io::Result<()> {
    let base_path = config.base_path.clone();
    info!("serving on {} under {:?}", config.listen, base_path);
    HttpServer::new(move || {
        App::new()
            .app_data(repo.clone())
            .wrap(Logger::default())
            .service(web::scope(&base_path).configure(routes))
    })
    .bind(config.listen.as_str())?
    .run()
    .await
}
