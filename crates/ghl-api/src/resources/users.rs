//! Users of the location

use super::Collection;
use crate::client::{ApiRequest, GhlClient, LocationParam, LOCATION_ID};
use crate::models::User;
use crate::ApiError;

pub const USERS: Collection = Collection {
    list_path: "/users/",
    item_base: "/users",
    singular: "user",
    plural: "users",
    location: LocationParam::Query(LOCATION_ID),
};

pub struct Users<'a> {
    client: &'a GhlClient,
}

impl<'a> Users<'a> {
    pub fn new(client: &'a GhlClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<User>, ApiError> {
        USERS.list(self.client, USERS.list_request()).await
    }

    pub async fn get(&self, id: &str) -> Result<User, ApiError> {
        USERS.get(self.client, id).await
    }

    /// The user the token belongs to.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.client
            .execute(ApiRequest::get("/users/me").without_location())
            .await?
            .decode("user")
    }

    /// Lists users and filters by name or email locally; the server-side
    /// search needs a company id that location tokens do not carry.
    pub async fn search(&self, query: &str) -> Result<Vec<User>, ApiError> {
        let users = self.list().await?;
        Ok(users.into_iter().filter(|u| u.matches(query)).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{client, ok, FakeTransport};

    #[tokio::test(start_paused = true)]
    async fn test_search_filters_listed_users() {
        let transport = FakeTransport::new(vec![ok(json!({"users": [
            {"id": "u1", "firstName": "Admin", "lastName": "User", "email": "admin@example.com"},
            {"id": "u2", "name": "Sam Sales", "email": "sam@example.com"}
        ]}))]);
        let client = client(transport.clone());

        let found = client.users().search("sales").await.unwrap();

        assert_eq!(transport.request_line(0), "GET /users/?locationId=loc1");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "u2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_accepts_bare_body() {
        let transport = FakeTransport::new(vec![ok(json!({"id": "u1", "name": "Admin"}))]);
        let client = client(transport.clone());

        let user = client.users().get("u1").await.unwrap();
        assert_eq!(user.display_name(), "Admin");
    }
}
