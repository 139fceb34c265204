//! Navigation guard.
//!
//! Every screen (or CLI command) maps to a [`Route`] with an access
//! requirement. [`guard`] decides whether navigation proceeds or is
//! redirected based on whether the session is authenticated.

/// Who may visit a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only while signed out (login, register)
    Guest,
    /// Only while signed in
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Standards,
    Goals,
    Reflections,
    Profile,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Login,
        Route::Register,
        Route::Dashboard,
        Route::Standards,
        Route::Goals,
        Route::Reflections,
        Route::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/",
            Route::Standards => "/standards",
            Route::Goals => "/goals",
            Route::Reflections => "/reflections",
            Route::Profile => "/profile",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login | Route::Register => Access::Guest,
            _ => Access::Auth,
        }
    }

    /// Resolve a path; anything unknown lands on the login page.
    pub fn from_path(path: &str) -> Route {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        Route::ALL
            .into_iter()
            .find(|route| route.path() == normalized)
            .unwrap_or(Route::Login)
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect {
        to: Route,
        /// Where to go after signing in
        redirect: Option<String>,
    },
}

pub fn guard(route: Route, authenticated: bool) -> Navigation {
    match (route.access(), authenticated) {
        (Access::Auth, false) => Navigation::Redirect {
            to: Route::Login,
            redirect: Some(route.path().to_string()),
        },
        (Access::Guest, true) => Navigation::Redirect {
            to: Route::Dashboard,
            redirect: None,
        },
        _ => Navigation::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_route_while_anonymous_redirects_to_login() {
        assert_eq!(
            guard(Route::Goals, false),
            Navigation::Redirect {
                to: Route::Login,
                redirect: Some("/goals".to_string()),
            }
        );
    }

    #[test]
    fn test_guest_route_while_authenticated_redirects_to_dashboard() {
        assert_eq!(
            guard(Route::Register, true),
            Navigation::Redirect {
                to: Route::Dashboard,
                redirect: None,
            }
        );
    }

    #[test]
    fn test_proceed() {
        assert_eq!(guard(Route::Login, false), Navigation::Proceed);
        assert_eq!(guard(Route::Profile, true), Navigation::Proceed);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Route::from_path("/reflections/"), Route::Reflections);
        assert_eq!(Route::from_path("/"), Route::Dashboard);
        assert_eq!(Route::from_path(""), Route::Dashboard);
        assert_eq!(Route::from_path("/does-not-exist"), Route::Login);
    }
}
