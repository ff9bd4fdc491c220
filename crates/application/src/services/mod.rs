mod poll_service;
mod user_service;

pub use poll_service::{
    CastVoteRequest, CreatePollRequest, PollService, PollServiceDependencies,
};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UserService, UserServiceDependencies,
};
