#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

use services::EventHub;

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    println!("🚀 GigConnect API running");
    println!("📚 Swagger UI → http://localhost:8000/api/docs");

    rocket::build()
        .attach(db::init())
        .attach(services::presence::init())
        .attach(CORS)
        .manage(EventHub::new())
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            routes![
                // Auth
                routes::auth::register,
                routes::auth::login,
                routes::auth::me,
                // Gigs
                routes::gig::get_gigs,
                routes::gig::get_my_gigs,
                routes::gig::search_gigs_by_location,
                routes::gig::get_gig_by_id,
                routes::gig::create_gig,
                routes::gig::update_gig,
                routes::gig::delete_gig,
                // Gig lifecycle
                routes::gig::freelancer_finish_gig,
                routes::gig::client_pay_gig,
                routes::gig::request_cancel_gig,
                routes::gig::approve_cancel_gig,
                routes::gig::reject_cancel_gig,
                routes::gig::create_order,
                routes::gig::verify_payment,
                // Bids
                routes::bid::create_bid,
                routes::bid::get_my_bids,
                routes::bid::get_my_accepted_bids,
                routes::bid::get_bids_for_gig,
                routes::bid::accept_bid,
                // Payments
                routes::payment::create_order,
                routes::payment::verify_payment,
                // Messages
                routes::message::get_messages,
                routes::message::send_message,
                // Chats
                routes::chat::access_chat,
                routes::chat::get_user_chats,
                routes::chat::send_chat_message,
                routes::chat::get_chat_messages,
                // Notifications
                routes::notification::get_notifications,
                routes::notification::mark_as_read,
                routes::notification::get_unread_count,
                // Real-time
                routes::events::notification_stream,
                routes::events::gig_stream,
                routes::events::chat_stream,
                routes::events::presence_stream,
                routes::events::get_presence,
                // Profiles
                routes::profile::get_profiles,
                routes::profile::get_profile_by_user,
                routes::profile::upsert_profile,
                // Reviews
                routes::review::create_review,
                routes::review::get_reviews_for_user,
                routes::review::get_reviews_for_gig,
                routes::review::get_average_rating_for_user,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, internal_error])
}
