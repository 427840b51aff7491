use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub open_id: Option<String>,
    pub role: String,
    pub last_signed_in_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub open_id: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = trips)]
pub struct Trip {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub share_token: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = trip_collaborators)]
#[diesel(belongs_to(Trip))]
#[diesel(belongs_to(User))]
#[diesel(primary_key(trip_id, user_id))]
pub struct TripCollaborator {
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub invited_by: Option<Uuid>,
    pub visit_count: i32,
    pub last_visited_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = trip_collaborators)]
pub struct NewTripCollaborator {
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub invited_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Trip))]
pub struct Document {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub category: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_key: String,
    pub tags: serde_json::Value,
    pub notes: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = hotels)]
#[diesel(belongs_to(Trip))]
pub struct Hotel {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub confirmation_number: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = transportation)]
#[diesel(belongs_to(Trip))]
pub struct Transportation {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub kind: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: NaiveDateTime,
    pub arrival_at: Option<NaiveDateTime>,
    pub carrier: Option<String>,
    pub service_number: Option<String>,
    pub confirmation_number: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = car_rentals)]
#[diesel(belongs_to(Trip))]
pub struct CarRental {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub company: String,
    pub pickup_location: String,
    pub pickup_at: NaiveDateTime,
    pub return_location: Option<String>,
    pub return_at: NaiveDateTime,
    pub car_model: Option<String>,
    pub confirmation_number: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = restaurants)]
#[diesel(belongs_to(Trip))]
pub struct Restaurant {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub cuisine: Option<String>,
    pub reservation_at: Option<NaiveDateTime>,
    pub party_size: Option<i32>,
    pub confirmation_number: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = tourist_sites)]
#[diesel(belongs_to(Trip))]
pub struct TouristSite {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub visit_at: Option<NaiveDateTime>,
    pub opening_hours: Option<String>,
    pub confirmation_number: Option<String>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = checklist_items)]
#[diesel(belongs_to(Trip))]
pub struct ChecklistItem {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub category: String,
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
    pub owner: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = travelers)]
#[diesel(belongs_to(Trip))]
pub struct Traveler {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = day_trips)]
#[diesel(belongs_to(Trip))]
pub struct DayTrip {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub start_location: String,
    pub end_location: Option<String>,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    pub stops: serde_json::Value,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = routes)]
#[diesel(belongs_to(Trip))]
pub struct Route {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub name_local: Option<String>,
    pub route_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub map_config: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = route_points_of_interest)]
#[diesel(belongs_to(Route))]
pub struct RoutePointOfInterest {
    pub id: Uuid,
    pub route_id: Uuid,
    pub name: String,
    pub name_local: Option<String>,
    pub poi_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub position: i32,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Queryable, Identifiable, Insertable, Associations)]
#[diesel(table_name = payments)]
#[diesel(belongs_to(Trip))]
pub struct Payment {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub activity_type: String,
    pub activity_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub paid_on: NaiveDate,
    pub method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activity_log)]
pub struct NewActivityLogEntry {
    pub id: Uuid,
    pub trip_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
}
