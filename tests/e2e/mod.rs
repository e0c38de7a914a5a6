// End-to-end tests for the FieldVoice Backend API
//
// Each test gets its own temporary directory holding the record collection,
// the media folder and the profile configuration. Gemini is replaced by a
// wiremock server that answers with server-sent events, so a batch runs the
// full path: HTTP -> batch handler -> worker -> owner thread -> disk.

mod helpers;
mod test_batch;
