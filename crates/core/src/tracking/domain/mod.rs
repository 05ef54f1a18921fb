pub mod bias_corrector;
pub mod stability_filter;
pub mod stable_result;
pub mod track;
pub mod track_matcher;
pub mod track_set;
