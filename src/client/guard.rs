//! Navigation guard. A pure function of the path and the cached auth flag:
//! it never talks to the server, so it is only a UX gate. The API enforces
//! access on its own.

pub const HOME: &str = "/";
pub const LOGIN: &str = "/login";
pub const SIGNUP: &str = "/signup";
pub const DASHBOARD: &str = "/dashboard";
pub const OAUTH_CALLBACK: &str = "/auth/google/callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Render,
    Redirect(&'static str),
}

fn is_dashboard(path: &str) -> bool {
    path == DASHBOARD
        || path
            .strip_prefix(DASHBOARD)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn guard(path: &str, authenticated: bool) -> Route {
    let path = path.split(['?', '#']).next().unwrap_or(path);

    match path {
        LOGIN | SIGNUP if authenticated => Route::Redirect(DASHBOARD),
        LOGIN | SIGNUP => Route::Render,
        OAUTH_CALLBACK => Route::Render,
        p if is_dashboard(p) => {
            if authenticated {
                Route::Render
            } else {
                Route::Redirect(LOGIN)
            }
        }
        _ if authenticated => Route::Redirect(DASHBOARD),
        _ => Route::Redirect(LOGIN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_and_signup_bounce_when_signed_in() {
        assert_eq!(guard(LOGIN, true), Route::Redirect(DASHBOARD));
        assert_eq!(guard(SIGNUP, true), Route::Redirect(DASHBOARD));
        assert_eq!(guard(LOGIN, false), Route::Render);
        assert_eq!(guard(SIGNUP, false), Route::Render);
    }

    #[test]
    fn dashboard_requires_auth() {
        assert_eq!(guard("/dashboard", true), Route::Render);
        assert_eq!(guard("/dashboard/courses", true), Route::Render);
        assert_eq!(guard("/dashboard", false), Route::Redirect(LOGIN));
        assert_eq!(guard("/dashboard/calendar", false), Route::Redirect(LOGIN));
        assert_eq!(guard("/dashboards", true), Route::Redirect(DASHBOARD));
    }

    #[test]
    fn everything_else_redirects() {
        assert_eq!(guard(HOME, true), Route::Redirect(DASHBOARD));
        assert_eq!(guard(HOME, false), Route::Redirect(LOGIN));
        assert_eq!(guard("/nowhere", false), Route::Redirect(LOGIN));
        assert_eq!(guard("/nowhere", true), Route::Redirect(DASHBOARD));
    }

    #[test]
    fn oauth_callback_always_renders() {
        assert_eq!(guard(OAUTH_CALLBACK, false), Route::Render);
        assert_eq!(guard("/auth/google/callback?code=abc", true), Route::Render);
    }
}
