use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

/// 定义错误类型的宏
///
/// 自动生成：
/// - enum 定义
/// - code() 方法
/// - error_type() 方法
/// - message() 方法
/// - status_code() 方法
macro_rules! define_linklet_errors {
    ($(
        $variant:ident($code:literal, $type_name:literal, $status:expr)
    ),* $(,)?) => {
        #[derive(Debug, Clone)]
        pub enum LinkletError {
            $($variant(String),)*
        }

        impl LinkletError {
            /// 获取错误代码
            pub fn code(&self) -> &'static str {
                match self {
                    $(LinkletError::$variant(_) => $code,)*
                }
            }

            /// 获取错误类型名称
            pub fn error_type(&self) -> &'static str {
                match self {
                    $(LinkletError::$variant(_) => $type_name,)*
                }
            }

            /// 获取错误详情
            pub fn message(&self) -> &str {
                match self {
                    $(LinkletError::$variant(msg) => msg,)*
                }
            }

            /// 对应的 HTTP 状态码
            pub fn http_status(&self) -> StatusCode {
                match self {
                    $(LinkletError::$variant(_) => $status,)*
                }
            }
        }
    };
}

define_linklet_errors! {
    InvalidUrl("E001", "Invalid URL", StatusCode::BAD_REQUEST),
    DuplicateAlias("E002", "Duplicate Alias", StatusCode::BAD_REQUEST),
    Validation("E003", "Validation Error", StatusCode::BAD_REQUEST),
    NotFound("E004", "Not Found", StatusCode::NOT_FOUND),
    Inactive("E005", "URL Inactive", StatusCode::FORBIDDEN),
    Expired("E006", "URL Expired", StatusCode::GONE),
    PasswordRequired("E007", "Password Required", StatusCode::UNAUTHORIZED),
    InvalidPassword("E008", "Invalid Password", StatusCode::UNAUTHORIZED),
    RateLimited("E009", "Rate Limit Exceeded", StatusCode::TOO_MANY_REQUESTS),
    DatabaseOperation("E010", "Database Operation Error", StatusCode::INTERNAL_SERVER_ERROR),
    Serialization("E011", "Serialization Error", StatusCode::INTERNAL_SERVER_ERROR),
    Internal("E012", "Internal Error", StatusCode::INTERNAL_SERVER_ERROR),
}

impl fmt::Display for LinkletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for LinkletError {}

// 便捷的构造函数
impl LinkletError {
    pub fn invalid_url<T: Into<String>>(msg: T) -> Self {
        LinkletError::InvalidUrl(msg.into())
    }

    pub fn duplicate_alias<T: Into<String>>(msg: T) -> Self {
        LinkletError::DuplicateAlias(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkletError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkletError::NotFound(msg.into())
    }

    pub fn inactive<T: Into<String>>(msg: T) -> Self {
        LinkletError::Inactive(msg.into())
    }

    pub fn expired<T: Into<String>>(msg: T) -> Self {
        LinkletError::Expired(msg.into())
    }

    pub fn password_required<T: Into<String>>(msg: T) -> Self {
        LinkletError::PasswordRequired(msg.into())
    }

    pub fn invalid_password<T: Into<String>>(msg: T) -> Self {
        LinkletError::InvalidPassword(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        LinkletError::RateLimited(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkletError::DatabaseOperation(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        LinkletError::Internal(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for LinkletError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkletError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkletError {
    fn from(err: serde_json::Error) -> Self {
        LinkletError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for LinkletError {
    fn from(err: chrono::ParseError) -> Self {
        LinkletError::Validation(err.to_string())
    }
}

impl ResponseError for LinkletError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.http_status();

        // 内部错误不向客户端暴露细节，只给错误代码
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error {}: {}", self.code(), self.message());
            format!("Internal error ({})", self.code())
        } else {
            self.message().to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.error_type(),
            "message": message,
            "status": status.as_u16(),
        }))
    }
}

pub type Result<T> = std::result::Result<T, LinkletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_statuses() {
        assert_eq!(LinkletError::invalid_url("x").code(), "E001");
        assert_eq!(
            LinkletError::invalid_url("x").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LinkletError::expired("x").http_status(),
            StatusCode::GONE
        );
        assert_eq!(
            LinkletError::inactive("x").http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            LinkletError::rate_limited("x").http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_display_format() {
        let err = LinkletError::duplicate_alias("alias already exists: demo");
        assert_eq!(
            err.to_string(),
            "Duplicate Alias: alias already exists: demo"
        );
    }
}
