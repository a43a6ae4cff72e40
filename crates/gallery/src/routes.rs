use std::fmt;

/// Pages the gallery can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`: every descriptor as a preview canvas.
    Gallery,
    /// `/detail/<id>`: one full canvas. The id is not checked here.
    Detail(String),
    /// Anything else; lands on the gallery.
    Redirect,
}

impl Route {
    /// Parses a location such as `/detail/texture`. A leading `#` (as in a
    /// hash-routed URL fragment) and one trailing slash are ignored.
    pub fn parse(location: &str) -> Self {
        let path = location.trim();
        let path = path.strip_prefix('#').unwrap_or(path);
        let path = match path.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => path,
        };

        if path.is_empty() || path == "/" {
            return Route::Gallery;
        }

        match path.strip_prefix("/detail/") {
            Some(id) if !id.is_empty() && !id.contains('/') => Route::Detail(id.to_string()),
            _ => Route::Redirect,
        }
    }

    /// The page actually shown for this route.
    pub fn resolve(self) -> Self {
        match self {
            Route::Redirect => Route::Gallery,
            other => other,
        }
    }

    pub fn detail(id: &str) -> Self {
        Route::Detail(id.to_string())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Gallery | Route::Redirect => f.write_str("/"),
            Route::Detail(id) => write!(f, "/detail/{id}"),
        }
    }
}
