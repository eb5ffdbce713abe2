//! Column names and artifact names shared across the pipeline stages.

// Entity (product) columns
pub const PRODUCT_ID: &str = "product_id";
pub const PRODUCT_NAME: &str = "product_name";
pub const CATEGORY: &str = "category";
pub const DISCOUNTED_PRICE: &str = "discounted_price";
pub const ACTUAL_PRICE: &str = "actual_price";
pub const DISCOUNT_PERCENTAGE: &str = "discount_percentage";
pub const ABOUT_PRODUCT: &str = "about_product";
pub const IMG_LINK: &str = "img_link";
pub const PRODUCT_LINK: &str = "product_link";
pub const RATING: &str = "rating";
pub const RATING_COUNT: &str = "rating_count";

// Actor (user) columns
pub const USER_ID: &str = "user_id";
pub const USER_NAME: &str = "user_name";

// Relation (review) columns
pub const REVIEW_ID: &str = "review_id";
pub const REVIEW_TITLE: &str = "review_title";
pub const REVIEW_CONTENT: &str = "review_content";

pub const PRODUCT_COLUMNS: [&str; 11] = [
    PRODUCT_ID,
    PRODUCT_NAME,
    CATEGORY,
    DISCOUNTED_PRICE,
    ACTUAL_PRICE,
    DISCOUNT_PERCENTAGE,
    ABOUT_PRODUCT,
    IMG_LINK,
    PRODUCT_LINK,
    RATING,
    RATING_COUNT,
];

pub const USER_COLUMNS: [&str; 2] = [USER_ID, USER_NAME];

pub const REVIEW_COLUMNS: [&str; 5] = [REVIEW_ID, USER_ID, PRODUCT_ID, REVIEW_TITLE, REVIEW_CONTENT];

// Artifact file names
pub const PRODUCTS_FILE: &str = "products.csv";
pub const USERS_FILE: &str = "users.csv";
pub const REVIEWS_FILE: &str = "reviews.csv";
pub const IMPORT_READY_REVIEWS_FILE: &str = "reviews_for_import.csv";
pub const PIPELINE_REPORT_FILE: &str = "pipeline_report.json";

/// Prefix that marks a sanitized artifact
pub const CLEANED_PREFIX: &str = "cleaned_";

// Store-side table names
pub const STORE_PRODUCTS_TABLE: &str = "products";

/// Rupee to dollar rate applied to converted price columns
pub const DEFAULT_CONVERSION_RATE: f64 = 0.012;

pub const ORPHAN_SAMPLE_SIZE: usize = 5;
pub const MISSING_KEY_SAMPLE_SIZE: usize = 10;

/// Name of the cleaned counterpart of an artifact, e.g. `cleaned_products.csv`
pub fn cleaned_name(file_name: &str) -> String {
    format!("{}{}", CLEANED_PREFIX, file_name)
}
