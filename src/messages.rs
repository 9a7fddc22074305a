//! Stable client-facing messages, kept in one place so handlers and tests
//! never drift apart on wording.

pub const REGISTER_SUCCESS: &str =
    "Registration successful. Please check your email for verification code.";
pub const EMAIL_ALREADY_EXISTS: &str = "Email already registered";
pub const USERNAME_TAKEN: &str = "Username already exists";
pub const VERIFY_EMAIL_SUCCESS: &str = "Email verified successfully";
pub const VERIFY_EMAIL_FAILED: &str = "Invalid or expired verification code";
pub const EMAIL_UNVERIFIED: &str = "Please verify your email before logging in";
pub const EMAIL_SEND_FAILED: &str = "Failed to send verification email";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const USER_NOT_FOUND: &str = "User not found";
pub const TOKEN_REQUIRED: &str = "Authentication token required";
pub const TOKEN_INVALID: &str = "Invalid or expired token";
pub const PRODUCT_NOT_FOUND: &str = "Product not found";
pub const INSUFFICIENT_STOCK: &str = "Insufficient stock";
pub const CATEGORY_REQUIRED: &str = "At least one category is required for the product";
pub const INVALID_IMAGE_TYPE: &str =
    "Invalid file type. Only JPEG, PNG and GIF image files are allowed.";
pub const INTERNAL_ERROR: &str = "Internal server error";
