pub mod youtube; // YouTube Data API v3 クライアント
