use std::collections::HashMap;

use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use uuid::Uuid;

use crate::budget::{BudgetItem, PaymentEntry};
use crate::models::{
    CarRental, ChecklistItem, DayTrip, Document, Hotel, Payment, Restaurant, Route,
    RoutePointOfInterest, TouristSite, Transportation, Traveler,
};
use crate::schema::{
    car_rentals, checklist_items, day_trips, documents, hotels, payments, restaurants,
    route_points_of_interest, routes, tourist_sites, transportation, travelers,
};
use crate::timeline::{self, TimelineEvent, TimelineSource};

#[derive(Debug, Clone, Serialize)]
pub struct RouteWithPois {
    #[serde(flatten)]
    pub route: Route,
    pub points_of_interest: Vec<RoutePointOfInterest>,
}

/// Every child row of one trip.
#[derive(Debug, Clone, Default)]
pub struct Itinerary {
    pub hotels: Vec<Hotel>,
    pub transportation: Vec<Transportation>,
    pub car_rentals: Vec<CarRental>,
    pub restaurants: Vec<Restaurant>,
    pub tourist_sites: Vec<TouristSite>,
    pub checklist: Vec<ChecklistItem>,
    pub travelers: Vec<Traveler>,
    pub day_trips: Vec<DayTrip>,
    pub routes: Vec<Route>,
    pub points_of_interest: Vec<RoutePointOfInterest>,
    pub payments: Vec<Payment>,
    pub documents: Vec<Document>,
}

impl Itinerary {
    pub fn load(conn: &mut PgConnection, trip_id: Uuid) -> QueryResult<Self> {
        let routes: Vec<Route> = routes::table
            .filter(routes::trip_id.eq(trip_id))
            .order((routes::route_date.asc(), routes::start_time.asc(), routes::name.asc()))
            .load(conn)?;
        let route_ids: Vec<Uuid> = routes.iter().map(|route| route.id).collect();

        Ok(Self {
            hotels: hotels::table
                .filter(hotels::trip_id.eq(trip_id))
                .order((hotels::check_in.asc(), hotels::name.asc()))
                .load(conn)?,
            transportation: transportation::table
                .filter(transportation::trip_id.eq(trip_id))
                .order(transportation::departure_at.asc())
                .load(conn)?,
            car_rentals: car_rentals::table
                .filter(car_rentals::trip_id.eq(trip_id))
                .order(car_rentals::pickup_at.asc())
                .load(conn)?,
            restaurants: restaurants::table
                .filter(restaurants::trip_id.eq(trip_id))
                .order((restaurants::reservation_at.asc(), restaurants::name.asc()))
                .load(conn)?,
            tourist_sites: tourist_sites::table
                .filter(tourist_sites::trip_id.eq(trip_id))
                .order((tourist_sites::visit_at.asc(), tourist_sites::name.asc()))
                .load(conn)?,
            checklist: checklist_items::table
                .filter(checklist_items::trip_id.eq(trip_id))
                .order((checklist_items::completed.asc(), checklist_items::created_at.asc()))
                .load(conn)?,
            travelers: travelers::table
                .filter(travelers::trip_id.eq(trip_id))
                .order(travelers::name.asc())
                .load(conn)?,
            day_trips: day_trips::table
                .filter(day_trips::trip_id.eq(trip_id))
                .order(day_trips::start_at.asc())
                .load(conn)?,
            points_of_interest: route_points_of_interest::table
                .filter(route_points_of_interest::route_id.eq_any(&route_ids))
                .order((
                    route_points_of_interest::position.asc(),
                    route_points_of_interest::created_at.asc(),
                ))
                .load(conn)?,
            routes,
            payments: payments::table
                .filter(payments::trip_id.eq(trip_id))
                .order((payments::paid_on.asc(), payments::created_at.asc()))
                .load(conn)?,
            documents: documents::table
                .filter(documents::trip_id.eq(trip_id))
                .order(documents::created_at.desc())
                .load(conn)?,
        })
    }

    pub fn routes_with_pois(&self) -> Vec<RouteWithPois> {
        let mut by_route: HashMap<Uuid, Vec<RoutePointOfInterest>> = HashMap::new();
        for poi in &self.points_of_interest {
            by_route.entry(poi.route_id).or_default().push(poi.clone());
        }
        self.routes
            .iter()
            .map(|route| RouteWithPois {
                points_of_interest: by_route.remove(&route.id).unwrap_or_default(),
                route: route.clone(),
            })
            .collect()
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        let sources = self
            .hotels
            .iter()
            .map(|row| row as &dyn TimelineSource)
            .chain(self.transportation.iter().map(|row| row as &dyn TimelineSource))
            .chain(self.car_rentals.iter().map(|row| row as &dyn TimelineSource))
            .chain(self.restaurants.iter().map(|row| row as &dyn TimelineSource))
            .chain(self.tourist_sites.iter().map(|row| row as &dyn TimelineSource))
            .chain(self.day_trips.iter().map(|row| row as &dyn TimelineSource))
            .chain(self.routes.iter().map(|row| row as &dyn TimelineSource));
        timeline::merge(sources)
    }

    pub fn budget_items(&self) -> Vec<BudgetItem> {
        self.hotels
            .iter()
            .filter_map(BudgetItem::from_activity)
            .chain(self.transportation.iter().filter_map(BudgetItem::from_activity))
            .chain(self.car_rentals.iter().filter_map(BudgetItem::from_activity))
            .chain(self.restaurants.iter().filter_map(BudgetItem::from_activity))
            .chain(self.tourist_sites.iter().filter_map(BudgetItem::from_activity))
            .collect()
    }

    pub fn payment_entries(&self) -> Vec<PaymentEntry> {
        self.payments
            .iter()
            .filter_map(PaymentEntry::from_payment)
            .collect()
    }
}
