// YouTube Data API: video metadata and channel upload listings.
//
// Every call goes through the quota fetcher so an exhausted key rolls over
// to the next one instead of failing the request.

pub mod channels;
pub mod client;
pub mod videos;
