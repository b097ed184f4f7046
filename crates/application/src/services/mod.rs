mod messaging_service;


pub use messaging_service::{
    ContactItemRequest, MessagingService, MessagingServiceDependencies, SendMessageRequest,
    StartConversationRequest,
};
