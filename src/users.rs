use diesel::{
    prelude::*,
    sql_types::{Nullable, Text},
    PgConnection,
};

use crate::models::User;
use crate::schema::users;

diesel::define_sql_function!(fn lower(value: Nullable<Text>) -> Nullable<Text>);

pub fn find_by_username(conn: &mut PgConnection, username: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(username.trim()))
        .first(conn)
        .optional()
}

/// Emails are unique case-insensitively.
pub fn find_by_email(conn: &mut PgConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(lower(users::email).eq(email.trim().to_lowercase()))
        .first(conn)
        .optional()
}
