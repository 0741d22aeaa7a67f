use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use sentier::api::{self, ApiResponse};
use sentier::{Engine, PathId, TopologyId};
use serde_json::Value;
use std::sync::{Arc, RwLock};

pub type SharedEngine = Arc<RwLock<Engine>>;

fn respond(response: ApiResponse) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(response.body)
}

fn poisoned() -> HttpResponse {
    respond(ApiResponse::error(500, "engine state is poisoned"))
}

fn read(engine: &SharedEngine, handler: impl FnOnce(&Engine) -> ApiResponse) -> HttpResponse {
    match engine.read() {
        Ok(engine) => respond(handler(&engine)),
        Err(_) => poisoned(),
    }
}

fn write(engine: &SharedEngine, handler: impl FnOnce(&mut Engine) -> ApiResponse) -> HttpResponse {
    match engine.write() {
        Ok(mut engine) => respond(handler(&mut engine)),
        Err(_) => poisoned(),
    }
}

#[actix_web::get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/plain"))
        .body("Hello World from Sentier Trailhead!")
}

#[actix_web::post("/api/route")]
pub async fn route(engine: web::Data<SharedEngine>, body: web::Json<Value>) -> impl Responder {
    read(&engine, |engine| api::route(engine, &body))
}

#[actix_web::post("/api/elevation/profile")]
pub async fn elevation_profile(
    engine: web::Data<SharedEngine>,
    body: web::Json<Value>,
) -> impl Responder {
    read(&engine, |engine| api::elevation_profile(engine, &body))
}

#[actix_web::post("/api/elevation/area")]
pub async fn elevation_area(
    engine: web::Data<SharedEngine>,
    body: web::Json<Value>,
) -> impl Responder {
    read(&engine, |engine| api::elevation_area(engine, &body))
}

#[actix_web::post("/api/topologies")]
pub async fn place_topology(
    engine: web::Data<SharedEngine>,
    body: web::Json<Value>,
) -> impl Responder {
    write(&engine, |engine| api::place(engine, &body))
}

#[actix_web::post("/api/topologies/reorder")]
pub async fn reorder_topologies(engine: web::Data<SharedEngine>) -> impl Responder {
    write(&engine, api::reorder)
}

#[actix_web::get("/api/topologies/{id}")]
pub async fn get_topology(
    engine: web::Data<SharedEngine>,
    path: web::Path<u64>,
) -> impl Responder {
    let id = TopologyId(path.into_inner());
    read(&engine, |engine| api::topology(engine, id))
}

#[actix_web::post("/api/paths")]
pub async fn save_path(engine: web::Data<SharedEngine>, body: web::Json<Value>) -> impl Responder {
    write(&engine, |engine| api::save_path(engine, &body))
}

#[actix_web::post("/api/paths/merge")]
pub async fn merge_paths(
    engine: web::Data<SharedEngine>,
    body: web::Json<Value>,
) -> impl Responder {
    write(&engine, |engine| api::merge_paths(engine, &body))
}

#[actix_web::delete("/api/paths/{id}")]
pub async fn delete_path(engine: web::Data<SharedEngine>, path: web::Path<u64>) -> impl Responder {
    let id = PathId(path.into_inner());
    write(&engine, |engine| api::delete_path(engine, id))
}
