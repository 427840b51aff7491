//! Copies a template trip into a fresh demo account.
//!
//! Every row gets a new id. References between rows (activity documents,
//! payment targets, route points) are rewritten to the new ids; anything that
//! points outside the copied set is dropped. Documents keep the template's
//! storage keys, so the object is shared rather than duplicated.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use uuid::Uuid;

use crate::itinerary::Itinerary;
use crate::kinds::ActivityType;
use crate::models::{
    CarRental, ChecklistItem, DayTrip, Document, Hotel, Payment, Restaurant, Route,
    RoutePointOfInterest, TouristSite, Transportation, Traveler, Trip,
};
use crate::schema::{
    car_rentals, checklist_items, day_trips, documents, hotels, payments, restaurants,
    route_points_of_interest, routes, tourist_sites, transportation, travelers, trips,
};

/// Fresh ids for one copy, keyed by the template row id.
#[derive(Debug, Default)]
struct IdMap {
    documents: HashMap<Uuid, Uuid>,
    activities: HashMap<(ActivityType, Uuid), Uuid>,
    routes: HashMap<Uuid, Uuid>,
}

impl IdMap {
    fn document(&self, old: Option<Uuid>) -> Option<Uuid> {
        old.and_then(|id| self.documents.get(&id).copied())
    }

    fn activity(&mut self, kind: ActivityType, old: Uuid) -> Uuid {
        *self
            .activities
            .entry((kind, old))
            .or_insert_with(Uuid::new_v4)
    }
}

/// Builds the rows of the copy without touching the database.
pub fn copy_itinerary(
    source: &Itinerary,
    trip_id: Uuid,
    owner_id: Uuid,
    now: NaiveDateTime,
) -> Itinerary {
    let mut ids = IdMap::default();

    let documents = source
        .documents
        .iter()
        .map(|doc| {
            let id = Uuid::new_v4();
            ids.documents.insert(doc.id, id);
            Document {
                id,
                trip_id,
                uploaded_by: Some(owner_id),
                created_at: now,
                updated_at: now,
                ..doc.clone()
            }
        })
        .collect();

    let hotels = source
        .hotels
        .iter()
        .map(|row| Hotel {
            id: ids.activity(ActivityType::Hotel, row.id),
            trip_id,
            document_id: ids.document(row.document_id),
            created_at: now,
            updated_at: now,
            ..row.clone()
        })
        .collect();
    let transportation = source
        .transportation
        .iter()
        .map(|row| Transportation {
            id: ids.activity(ActivityType::Transportation, row.id),
            trip_id,
            document_id: ids.document(row.document_id),
            created_at: now,
            updated_at: now,
            ..row.clone()
        })
        .collect();
    let car_rentals = source
        .car_rentals
        .iter()
        .map(|row| CarRental {
            id: ids.activity(ActivityType::CarRental, row.id),
            trip_id,
            document_id: ids.document(row.document_id),
            created_at: now,
            updated_at: now,
            ..row.clone()
        })
        .collect();
    let restaurants = source
        .restaurants
        .iter()
        .map(|row| Restaurant {
            id: ids.activity(ActivityType::Restaurant, row.id),
            trip_id,
            document_id: ids.document(row.document_id),
            created_at: now,
            updated_at: now,
            ..row.clone()
        })
        .collect();
    let tourist_sites = source
        .tourist_sites
        .iter()
        .map(|row| TouristSite {
            id: ids.activity(ActivityType::TouristSite, row.id),
            trip_id,
            document_id: ids.document(row.document_id),
            created_at: now,
            updated_at: now,
            ..row.clone()
        })
        .collect();

    let payments = source
        .payments
        .iter()
        .filter_map(|row| {
            let kind = ActivityType::parse(&row.activity_type)?;
            let activity_id = ids.activities.get(&(kind, row.activity_id)).copied()?;
            Some(Payment {
                id: Uuid::new_v4(),
                trip_id,
                activity_id,
                created_by: Some(owner_id),
                created_at: now,
                updated_at: now,
                ..row.clone()
            })
        })
        .collect();

    let routes = source
        .routes
        .iter()
        .map(|row| {
            let id = Uuid::new_v4();
            ids.routes.insert(row.id, id);
            Route {
                id,
                trip_id,
                created_at: now,
                updated_at: now,
                ..row.clone()
            }
        })
        .collect();
    let points_of_interest = source
        .points_of_interest
        .iter()
        .filter_map(|row| {
            Some(RoutePointOfInterest {
                id: Uuid::new_v4(),
                route_id: ids.routes.get(&row.route_id).copied()?,
                created_at: now,
                ..row.clone()
            })
        })
        .collect();

    Itinerary {
        hotels,
        transportation,
        car_rentals,
        restaurants,
        tourist_sites,
        checklist: source
            .checklist
            .iter()
            .map(|row| ChecklistItem {
                id: Uuid::new_v4(),
                trip_id,
                created_at: now,
                updated_at: now,
                ..row.clone()
            })
            .collect(),
        travelers: source
            .travelers
            .iter()
            .map(|row| Traveler {
                id: Uuid::new_v4(),
                trip_id,
                created_at: now,
                updated_at: now,
                ..row.clone()
            })
            .collect(),
        day_trips: source
            .day_trips
            .iter()
            .map(|row| DayTrip {
                id: Uuid::new_v4(),
                trip_id,
                created_at: now,
                updated_at: now,
                ..row.clone()
            })
            .collect(),
        routes,
        points_of_interest,
        payments,
        documents,
    }
}

macro_rules! insert_rows {
    ($conn:expr, $table:path, $rows:expr) => {
        if !$rows.is_empty() {
            diesel::insert_into($table).values($rows).execute($conn)?;
        }
    };
}

/// Copies the template trip to `owner_id`. Returns `None` when the template
/// no longer exists. Callers run this inside a transaction.
pub fn copy_trip(
    conn: &mut PgConnection,
    template_id: Uuid,
    owner_id: Uuid,
) -> QueryResult<Option<Trip>> {
    let Some(template) = trips::table
        .find(template_id)
        .first::<Trip>(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let now = Utc::now().naive_utc();
    let trip = Trip {
        id: Uuid::new_v4(),
        owner_id,
        share_token: None,
        created_at: now,
        updated_at: now,
        ..template
    };
    let trip: Trip = diesel::insert_into(trips::table)
        .values(&trip)
        .get_result(conn)?;

    let source = Itinerary::load(conn, template_id)?;
    let copy = copy_itinerary(&source, trip.id, owner_id, now);

    // Documents first: activities reference them.
    insert_rows!(conn, documents::table, &copy.documents);
    insert_rows!(conn, hotels::table, &copy.hotels);
    insert_rows!(conn, transportation::table, &copy.transportation);
    insert_rows!(conn, car_rentals::table, &copy.car_rentals);
    insert_rows!(conn, restaurants::table, &copy.restaurants);
    insert_rows!(conn, tourist_sites::table, &copy.tourist_sites);
    insert_rows!(conn, payments::table, &copy.payments);
    insert_rows!(conn, checklist_items::table, &copy.checklist);
    insert_rows!(conn, travelers::table, &copy.travelers);
    insert_rows!(conn, day_trips::table, &copy.day_trips);
    insert_rows!(conn, routes::table, &copy.routes);
    insert_rows!(conn, route_points_of_interest::table, &copy.points_of_interest);

    Ok(Some(trip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn template() -> Itinerary {
        let trip_id = Uuid::new_v4();
        let document = Document {
            id: Uuid::new_v4(),
            trip_id,
            name: "Booking".to_string(),
            category: "hotel".to_string(),
            file_name: "booking.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            size_bytes: 10,
            storage_key: "trips/t/documents/d/booking.pdf".to_string(),
            tags: json!([]),
            notes: None,
            uploaded_by: None,
            created_at: ts(),
            updated_at: ts(),
        };
        let hotel = Hotel {
            id: Uuid::new_v4(),
            trip_id,
            name: "Seaside".to_string(),
            address: None,
            check_in: ts(),
            check_out: ts(),
            confirmation_number: None,
            price_cents: Some(50_000),
            currency: Some("EUR".to_string()),
            payment_status: None,
            document_id: Some(document.id),
            notes: None,
            created_at: ts(),
            updated_at: ts(),
        };
        let payment = |activity_type: &str, activity_id: Uuid| Payment {
            id: Uuid::new_v4(),
            trip_id,
            activity_type: activity_type.to_string(),
            activity_id,
            amount_cents: 10_000,
            currency: "EUR".to_string(),
            paid_on: ts().date(),
            method: None,
            notes: None,
            created_by: None,
            created_at: ts(),
            updated_at: ts(),
        };
        let route = Route {
            id: Uuid::new_v4(),
            trip_id,
            name: "Coast road".to_string(),
            name_local: None,
            route_date: ts().date(),
            start_time: None,
            distance_km: Some(42.0),
            duration_minutes: None,
            map_config: None,
            notes: None,
            created_at: ts(),
            updated_at: ts(),
        };
        let poi = RoutePointOfInterest {
            id: Uuid::new_v4(),
            route_id: route.id,
            name: "Lighthouse".to_string(),
            name_local: None,
            poi_type: "viewpoint".to_string(),
            latitude: 43.0,
            longitude: 5.0,
            position: 0,
            notes: None,
            created_at: ts(),
        };

        Itinerary {
            payments: vec![
                payment("hotel", hotel.id),
                payment("restaurant", Uuid::new_v4()),
            ],
            hotels: vec![hotel],
            documents: vec![document],
            routes: vec![route],
            points_of_interest: vec![poi],
            ..Itinerary::default()
        }
    }

    #[test]
    fn copy_remaps_every_reference() {
        let source = template();
        let trip_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let copy = copy_itinerary(&source, trip_id, owner_id, Utc::now().naive_utc());

        let document = &copy.documents[0];
        assert_ne!(document.id, source.documents[0].id);
        assert_eq!(document.trip_id, trip_id);
        assert_eq!(document.storage_key, source.documents[0].storage_key);
        assert_eq!(document.uploaded_by, Some(owner_id));

        let hotel = &copy.hotels[0];
        assert_ne!(hotel.id, source.hotels[0].id);
        assert_eq!(hotel.document_id, Some(document.id));
        assert_eq!(hotel.price_cents, Some(50_000));

        assert_eq!(copy.payments.len(), 1);
        assert_eq!(copy.payments[0].activity_id, hotel.id);
        assert_eq!(copy.payments[0].trip_id, trip_id);

        assert_eq!(copy.points_of_interest[0].route_id, copy.routes[0].id);
        assert_ne!(copy.routes[0].id, source.routes[0].id);
    }

    #[test]
    fn links_to_rows_outside_the_template_are_dropped() {
        let mut source = template();
        source.hotels[0].document_id = Some(Uuid::new_v4());
        source.points_of_interest[0].route_id = Uuid::new_v4();

        let copy = copy_itinerary(&source, Uuid::new_v4(), Uuid::new_v4(), ts());
        assert_eq!(copy.hotels[0].document_id, None);
        assert!(copy.points_of_interest.is_empty());
    }
}
